//! The per-pathogen parameter catalog
//!
//! A `Disease` is immutable for the length of a run: it presents the
//! pathogen's configuration as typed accessors so the rest of the core
//! never re-reads raw parameters. Diseases are owned by the region and
//! referenced everywhere else by their index (`DiseaseId`) into the
//! region's ordered catalog.

use crate::facility::FacilityType;
use crate::parameters::Params;

/// Index into the region's ordered disease catalog.
pub type DiseaseId = usize;

#[derive(Debug, Clone)]
pub struct Disease {
    name: String,
    beta: f64,
    beta_reduction: f64,
    mean_detection_time: f64,
    mean_decolonization_time: f64,
    prob_surveillance_detection: f64,
    importation_probability: f64,
    isolate_on_detection: bool,
    surveillance_target: bool,
    allow_importation_during_burn_in: bool,
}

impl Disease {
    #[must_use]
    pub fn from_params(params: &Params) -> Disease {
        Disease {
            name: params.disease_name.clone(),
            beta: params.beta,
            beta_reduction: params.beta_reduction,
            mean_detection_time: params.mean_detection_time,
            mean_decolonization_time: params.avg_decolonization_time,
            prob_surveillance_detection: params.prob_surveillance_detection,
            importation_probability: params.importation_rate,
            isolate_on_detection: params.isolate_patient_when_detected,
            surveillance_target: params.is_surveillance_target,
            allow_importation_during_burn_in: params.allow_importations_during_burn_in,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Baseline transmission coefficient for the given facility type
    #[must_use]
    pub fn transmission_coefficient(&self, facility_type: FacilityType) -> f64 {
        match facility_type {
            FacilityType::LongTermAcuteCare | FacilityType::AcuteCare => self.beta,
            FacilityType::NursingHome => self.beta / self.beta_reduction,
        }
    }

    /// Mean days from colonization to clinical detection
    ///
    /// Currently identical across facility types; the accessor keeps the
    /// facility type in its signature because the catalog is keyed by it.
    #[must_use]
    pub fn mean_clinical_detection_time(&self, _facility_type: FacilityType) -> f64 {
        self.mean_detection_time
    }

    #[must_use]
    pub fn mean_decolonization_time(&self) -> f64 {
        self.mean_decolonization_time
    }

    #[must_use]
    pub fn surveillance_detection_probability(&self) -> f64 {
        self.prob_surveillance_detection
    }

    #[must_use]
    pub fn importation_probability(&self) -> f64 {
        self.importation_probability
    }

    #[must_use]
    pub fn isolate_on_detection(&self) -> bool {
        self.isolate_on_detection
    }

    #[must_use]
    pub fn is_surveillance_target(&self) -> bool {
        self.surveillance_target
    }

    #[must_use]
    pub fn allow_importation_during_burn_in(&self) -> bool {
        self.allow_importation_during_burn_in
    }
}
