//! Run parameters
//!
//! All named run parameters live in a single serde-backed [`Params`] struct
//! loaded once from a JSON file (or assembled in code by tests) and stored
//! on the context, so the rest of the simulation reads typed fields instead
//! of re-parsing raw configuration. Validation happens once, up front;
//! anything out of range fails the run before the first event executes.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::SimError;
use crate::facility::FacilityType;

/// Size and type of one facility in the simulated region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub size: u32,
    pub facility_type: FacilityType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Base seed for all random streams.
    pub seed: u64,
    /// Baseline transmission coefficient for long-term acute care.
    pub beta: f64,
    /// Divisor applied to `beta` for nursing-home facilities.
    pub beta_reduction: f64,
    /// Fraction of a colonized patient's transmission contribution removed
    /// by isolation precautions.
    pub isolation_effectiveness: f64,
    /// Mean days from colonization to clinical detection.
    pub mean_detection_time: f64,
    /// Mean days to spontaneous decolonization.
    pub avg_decolonization_time: f64,
    /// Test sensitivity of one surveillance swab.
    pub prob_surveillance_detection: f64,
    /// Fraction of admissions actually swabbed when admission surveillance
    /// is on.
    pub admission_surveillance_adherence: f64,
    /// Fraction of scheduled mid-stay tests actually performed.
    pub midstay_surveillance_adherence: f64,
    /// Probability that a newly admitted patient is already colonized.
    pub importation_rate: f64,
    pub allow_importations_during_burn_in: bool,
    pub isolate_patient_when_detected: bool,
    /// Whether the pathogen is a target of active surveillance testing.
    pub is_surveillance_target: bool,
    pub do_active_surveillance_after_burn_in: bool,
    /// Days between mid-stay surveillance tests for one patient.
    pub days_between_tests: f64,
    pub burn_in_days: f64,
    pub post_burn_in_days: f64,
    pub facilities: Vec<FacilityConfig>,
    /// Two-component gamma mixture fit for long-term acute care stays.
    pub los_shape1: f64,
    pub los_scale1: f64,
    pub los_shape2: f64,
    pub los_scale2: f64,
    pub los_prob1: f64,
    pub disease_name: String,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            seed: 123,
            beta: 0.05,
            beta_reduction: 1.0,
            isolation_effectiveness: 0.9,
            mean_detection_time: 14.0,
            avg_decolonization_time: 365.0,
            prob_surveillance_detection: 0.8,
            admission_surveillance_adherence: 1.0,
            midstay_surveillance_adherence: 1.0,
            importation_rate: 0.05,
            allow_importations_during_burn_in: true,
            isolate_patient_when_detected: true,
            is_surveillance_target: true,
            do_active_surveillance_after_burn_in: true,
            days_between_tests: 14.0,
            burn_in_days: 3650.0,
            post_burn_in_days: 1825.0,
            facilities: vec![FacilityConfig {
                size: 75,
                facility_type: FacilityType::LongTermAcuteCare,
            }],
            // Mixture mean ~27.12 days, matching the empirical stay fit.
            los_shape1: 0.8,
            los_scale1: 10.0,
            los_shape2: 2.0,
            los_scale2: 25.0,
            los_prob1: 0.544764,
            disease_name: "CRE".to_string(),
        }
    }
}

impl Params {
    /// Check every field against its legal range
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameter` naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SimError> {
        let probabilities = [
            ("isolation_effectiveness", self.isolation_effectiveness),
            ("prob_surveillance_detection", self.prob_surveillance_detection),
            (
                "admission_surveillance_adherence",
                self.admission_surveillance_adherence,
            ),
            (
                "midstay_surveillance_adherence",
                self.midstay_surveillance_adherence,
            ),
            ("importation_rate", self.importation_rate),
            ("los_prob1", self.los_prob1),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::InvalidParameter(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if !(self.beta.is_finite() && self.beta >= 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "beta must be non-negative, got {}",
                self.beta
            )));
        }
        let positive = [
            ("beta_reduction", self.beta_reduction),
            ("mean_detection_time", self.mean_detection_time),
            ("avg_decolonization_time", self.avg_decolonization_time),
            ("days_between_tests", self.days_between_tests),
            ("burn_in_days", self.burn_in_days),
            ("post_burn_in_days", self.post_burn_in_days),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidParameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.facilities.is_empty() {
            return Err(SimError::InvalidParameter(
                "at least one facility must be configured".to_string(),
            ));
        }
        for facility in &self.facilities {
            if facility.size == 0 {
                return Err(SimError::InvalidParameter(
                    "facility size must be at least one patient".to_string(),
                ));
            }
        }
        Ok(())
    }
}

crate::context::define_data_plugin!(pub ParamsPlugin, Option<Params>, None);

pub trait ContextParametersExt {
    /// Load, validate, and store parameters from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not valid JSON, or
    /// fails validation. All of these are fatal startup failures.
    fn init_parameters(&mut self, path: &Path) -> Result<(), SimError>;

    /// Validate and store an already-built parameter set
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameter` if validation fails.
    fn set_parameters(&mut self, params: Params) -> Result<(), SimError>;

    /// The run's parameters
    ///
    /// # Panics
    ///
    /// Panics if parameters were never initialized.
    fn get_params(&self) -> &Params;
}

impl ContextParametersExt for Context {
    fn init_parameters(&mut self, path: &Path) -> Result<(), SimError> {
        let file = File::open(path)?;
        let params: Params = serde_json::from_reader(file)?;
        self.set_parameters(params)
    }

    fn set_parameters(&mut self, params: Params) -> Result<(), SimError> {
        params.validate()?;
        *self.get_data_container_mut(ParamsPlugin) = Some(params);
        Ok(())
    }

    fn get_params(&self) -> &Params {
        self.get_data_container(ParamsPlugin)
            .and_then(Option::as_ref)
            .expect("parameters not initialized")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_params_validate() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let params = Params {
            importation_rate: 1.5,
            ..Params::default()
        };
        match params.validate() {
            Err(SimError::InvalidParameter(message)) => {
                assert!(message.contains("importation_rate"));
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_mean() {
        let params = Params {
            avg_decolonization_time: 0.0,
            ..Params::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_empty_facility_list() {
        let params = Params {
            facilities: vec![],
            ..Params::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn loads_overrides_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"beta": 0.08, "importation_rate": 0.0, "disease_name": "MRSA"}}"#
        )
        .unwrap();

        let mut context = Context::new();
        context.init_parameters(file.path()).unwrap();

        let params = context.get_params();
        assert_eq!(params.beta, 0.08);
        assert_eq!(params.importation_rate, 0.0);
        assert_eq!(params.disease_name, "MRSA");
        // Untouched fields keep their defaults.
        assert_eq!(params.days_between_tests, 14.0);
    }

    #[test]
    fn missing_file_is_fatal() {
        let mut context = Context::new();
        let result = context.init_parameters(Path::new("does-not-exist.json"));
        assert!(matches!(result, Err(SimError::IoError(_))));
    }

    #[test]
    #[should_panic(expected = "parameters not initialized")]
    fn get_params_requires_init() {
        let context = Context::new();
        let _ = context.get_params();
    }
}
