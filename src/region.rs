//! The region: facility set, disease catalog, burn-in phase, and
//! cross-facility aggregates
//!
//! The region owns everything with run scope: the fixed facility set, the
//! ordered disease catalog, the live patient map, the patient id counter,
//! and the burn-in/steady-state flag. Statistics gathered while
//! `in_burn_in_period` is true are discarded; colonization can still occur
//! on import during burn-in if the disease permits it.

use std::collections::HashMap;

use crate::context::Context;
use crate::disease::Disease;
use crate::error::SimError;
use crate::event_reports::{DailyCensusRecord, SummaryRecord};
use crate::facility::{self, Facility};
use crate::log::info;
use crate::outbreak::{self, FacilityOutbreak};
use crate::parameters::ContextParametersExt;
use crate::patient::{Patient, PatientId};
use crate::report::ContextReportExt;

#[derive(Debug, Default)]
pub struct RegionData {
    /// Ordered catalog; every patient's state list is index-aligned with
    /// it.
    pub diseases: Vec<Disease>,
    pub facilities: Vec<Facility>,
    /// Every live patient across all facilities. Invariant: equals the
    /// union of the facility rosters.
    pub people: HashMap<PatientId, Patient>,
    next_patient_id: u64,
    pub in_burn_in_period: bool,
    /// Frozen once the burn-in period ends.
    pub colonized_admissions_during_burn_in: u32,
    pub admissions_at_burn_in_end: u32,
    pub transmissions_at_burn_in_end: u32,
    pub post_burn_in_transmissions: u32,
    pub clinical_detections: u32,
    pub surveillance_detections: u32,
    /// One cross-facility prevalence sample per post-burn-in day.
    pub daily_prevalence_samples: Vec<f64>,
}

impl RegionData {
    pub fn new_patient_id(&mut self) -> PatientId {
        let id = PatientId(self.next_patient_id);
        self.next_patient_id += 1;
        id
    }

    #[must_use]
    pub fn patient(&self, id: PatientId) -> Option<&Patient> {
        self.people.get(&id)
    }

    pub fn patient_mut(&mut self, id: PatientId) -> Option<&mut Patient> {
        self.people.get_mut(&id)
    }

    #[must_use]
    pub fn total_population(&self) -> usize {
        self.people.len()
    }

    #[must_use]
    pub fn total_admissions(&self) -> u32 {
        self.facilities.iter().map(|f| f.total_admissions).sum()
    }

    #[must_use]
    pub fn total_transmissions(&self) -> u32 {
        self.facilities
            .iter()
            .flat_map(|f| f.outbreaks.iter())
            .map(|o| o.transmissions_tally)
            .sum()
    }

    #[must_use]
    pub fn mean_daily_prevalence(&self) -> f64 {
        if self.daily_prevalence_samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.daily_prevalence_samples.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        {
            sum / self.daily_prevalence_samples.len() as f64
        }
    }

    #[must_use]
    pub fn mean_discharge_prevalence(&self) -> f64 {
        mean_over_outbreaks(self, FacilityOutbreak::discharge_prevalence)
    }

    #[must_use]
    pub fn importation_prevalence(&self) -> f64 {
        mean_over_outbreaks(self, FacilityOutbreak::importation_prevalence)
    }
}

fn mean_over_outbreaks(region: &RegionData, value: fn(&FacilityOutbreak) -> f64) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for facility in &region.facilities {
        for outbreak in &facility.outbreaks {
            sum += value(outbreak);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    sum / f64::from(count)
}

crate::context::define_data_plugin!(
    pub RegionPlugin,
    RegionData,
    RegionData {
        in_burn_in_period: true,
        ..RegionData::default()
    }
);

pub trait ContextRegionExt {
    /// The region's data container
    ///
    /// # Panics
    ///
    /// Panics if the region was never initialized.
    fn region(&self) -> &RegionData;

    fn region_mut(&mut self) -> &mut RegionData;
}

impl ContextRegionExt for Context {
    fn region(&self) -> &RegionData {
        self.get_data_container(RegionPlugin)
            .expect("region not initialized")
    }

    fn region_mut(&mut self) -> &mut RegionData {
        self.get_data_container_mut(RegionPlugin)
    }
}

/// Build the region from the run parameters and start the simulation
/// processes
///
/// Constructs the disease catalog and facility set, seeds every facility
/// to its target census, starts each facility's admission stream, and
/// schedules the end of the burn-in period.
///
/// # Errors
///
/// Returns `SimError::InvalidParameter` if a facility cannot be built
/// from the parameters.
pub fn init(context: &mut Context) -> Result<(), SimError> {
    let params = context.get_params().clone();
    let diseases = vec![Disease::from_params(&params)];

    let mut facilities = Vec::with_capacity(params.facilities.len());
    for (facility_id, config) in params.facilities.iter().enumerate() {
        let mut facility = Facility::new(facility_id, *config, &params)?;
        for disease_id in 0..diseases.len() {
            facility.outbreaks.push(FacilityOutbreak::new(disease_id));
        }
        facilities.push(facility);
    }

    {
        let region = context.region_mut();
        region.diseases = diseases;
        region.facilities = facilities;
        region.in_burn_in_period = true;
    }

    for (facility_id, config) in params.facilities.iter().enumerate() {
        for _ in 0..config.size {
            facility::admit_initial_patient(context, facility_id);
        }
        facility::schedule_next_admission(context, facility_id);
    }

    info!(
        "region initialized: {} facilities, burn-in until t={}",
        params.facilities.len(),
        params.burn_in_days
    );
    context.add_plan(params.burn_in_days, end_burn_in);
    Ok(())
}

/// End the burn-in period
///
/// Freezes the burn-in counters, flips the phase flag, enables active
/// surveillance if configured, starts the daily population tally, and
/// schedules the end of the run.
pub fn end_burn_in(context: &mut Context) {
    let (do_surveillance, days_between_tests, post_burn_in_days) = {
        let params = context.get_params();
        (
            params.do_active_surveillance_after_burn_in,
            params.days_between_tests,
            params.post_burn_in_days,
        )
    };
    {
        let region = context.region_mut();
        region.in_burn_in_period = false;
        region.admissions_at_burn_in_end = region.total_admissions();
        region.transmissions_at_burn_in_end = region.total_transmissions();
        if do_surveillance {
            for facility in &mut region.facilities {
                facility.start_active_surveillance(days_between_tests);
            }
        }
    }
    let now = context.get_current_time();
    info!(
        "burn-in ended at t={now}: {} admissions, {} transmissions so far",
        context.region().admissions_at_burn_in_end,
        context.region().transmissions_at_burn_in_end
    );
    context.add_periodic_plan(now + 1.0, 1.0, do_population_tally);
    context.add_plan(now + post_burn_in_days, finish);
}

/// Daily cross-facility tally
///
/// Checks the roster/people invariant, updates every facility's census
/// bookkeeping, records one region-wide prevalence sample, and emits a
/// census record per facility and disease.
pub fn do_population_tally(context: &mut Context) {
    let num_facilities = context.region().facilities.len();
    {
        let region = context.region();
        let roster_total: usize = region.facilities.iter().map(|f| f.roster.len()).sum();
        assert_eq!(
            roster_total,
            region.total_population(),
            "facility rosters and region population have drifted apart"
        );
    }
    for facility_id in 0..num_facilities {
        facility::update_population_tally(context, facility_id);
    }

    let time = context.get_current_time();
    let mut prevalence_sum = 0.0;
    let mut prevalence_count = 0u32;
    let mut census = Vec::new();
    {
        let region = context.region();
        for facility in &region.facilities {
            for disease_id in 0..region.diseases.len() {
                let prevalence = outbreak::get_prevalence(region, facility.id, disease_id);
                prevalence_sum += prevalence;
                prevalence_count += 1;
                let mut colonized = 0u32;
                let mut detected = 0u32;
                let mut isolated = 0u32;
                for patient_id in &facility.roster {
                    let patient = &region.people[patient_id];
                    if patient.states[disease_id].colonized {
                        colonized += 1;
                    }
                    if patient.states[disease_id].detected {
                        detected += 1;
                    }
                    if patient.isolated {
                        isolated += 1;
                    }
                }
                #[allow(clippy::cast_possible_truncation)]
                census.push(DailyCensusRecord {
                    time,
                    facility_id: facility.id,
                    disease_id,
                    population: facility.roster.len() as u32,
                    colonized,
                    detected,
                    isolated,
                });
            }
        }
    }
    for record in census {
        context.send_report(record);
    }
    if prevalence_count > 0 {
        let sample = prevalence_sum / f64::from(prevalence_count);
        context.region_mut().daily_prevalence_samples.push(sample);
    }
}

/// Emit the end-of-run summary and stop the simulation
pub fn finish(context: &mut Context) {
    let summary = {
        let region = context.region();
        let params = context.get_params();
        SummaryRecord {
            surveillance_after_burn_in: params.do_active_surveillance_after_burn_in,
            isolation_effectiveness: params.isolation_effectiveness,
            days_between_tests: params.days_between_tests,
            clinical_detections: region.clinical_detections,
            surveillance_detections: region.surveillance_detections,
            mean_daily_prevalence: region.mean_daily_prevalence(),
            mean_discharge_prevalence: region.mean_discharge_prevalence(),
            importation_prevalence: region.importation_prevalence(),
            transmissions: region.total_transmissions(),
            transmissions_post_burn_in: region.post_burn_in_transmissions,
            total_admissions: region.total_admissions(),
            admissions_at_burn_in_end: region.admissions_at_burn_in_end,
            colonized_admissions_during_burn_in: region.colonized_admissions_during_burn_in,
        }
    };
    context.send_report(summary);
    info!(
        "simulation finished at t={}: {} transmissions, {} clinical detections",
        context.get_current_time(),
        context.region().total_transmissions(),
        context.region().clinical_detections
    );
    context.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::FacilityType;
    use crate::parameters::{FacilityConfig, Params};
    use crate::random::ContextRandomExt;

    fn short_run_params() -> Params {
        Params {
            facilities: vec![FacilityConfig {
                size: 20,
                facility_type: FacilityType::LongTermAcuteCare,
            }],
            burn_in_days: 30.0,
            post_burn_in_days: 30.0,
            importation_rate: 0.1,
            ..Params::default()
        }
    }

    fn setup_context(params: Params) -> Context {
        let mut context = Context::new();
        let seed = params.seed;
        context.set_parameters(params).unwrap();
        context.init_random(seed);
        init(&mut context).unwrap();
        context
    }

    #[test]
    fn init_seeds_facilities_to_target() {
        let context = setup_context(short_run_params());
        let region = context.region();
        assert_eq!(region.facilities.len(), 1);
        assert_eq!(region.facilities[0].roster.len(), 20);
        assert_eq!(region.total_population(), 20);
        assert!(region.in_burn_in_period);
    }

    #[test]
    fn patient_ids_are_unique_and_run_scoped() {
        let mut context = setup_context(short_run_params());
        let a = context.region_mut().new_patient_id();
        let b = context.region_mut().new_patient_id();
        assert_ne!(a, b);

        // A second run's region starts counting from zero again.
        let other = setup_context(short_run_params());
        let first_again = context.region().facilities[0].roster[0];
        assert_eq!(other.region().facilities[0].roster[0], first_again);
    }

    #[test]
    fn burn_in_flag_flips_and_counters_freeze() {
        let mut context = setup_context(short_run_params());
        context.execute();
        let region = context.region();
        assert!(!region.in_burn_in_period);
        // The burn-in snapshot cannot exceed the lifetime totals.
        assert!(region.admissions_at_burn_in_end <= region.total_admissions());
        assert!(region.transmissions_at_burn_in_end <= region.total_transmissions());
    }

    #[test]
    fn full_run_maintains_roster_invariant_and_prevalence_bounds() {
        let mut context = setup_context(short_run_params());
        context.execute();
        let region = context.region();
        let roster_total: usize = region.facilities.iter().map(|f| f.roster.len()).sum();
        assert_eq!(roster_total, region.total_population());
        for sample in &region.daily_prevalence_samples {
            assert!((0.0..=1.0).contains(sample));
        }
        // One sample per post-burn-in day; the run ends before the final
        // day's tally fires.
        assert_eq!(region.daily_prevalence_samples.len(), 29);
        let summary_prevalence = region.mean_daily_prevalence();
        assert!((0.0..=1.0).contains(&summary_prevalence));
    }

    #[test]
    fn importation_disabled_during_burn_in_when_disease_says_so() {
        let params = Params {
            allow_importations_during_burn_in: false,
            importation_rate: 1.0,
            ..short_run_params()
        };
        let context = setup_context(params);
        let region = context.region();
        assert_eq!(region.colonized_admissions_during_burn_in, 0);
        for patient in region.people.values() {
            assert!(!patient.states[0].colonized);
        }
    }

    #[test]
    fn run_with_certain_importation_detects_and_isolates() {
        let params = Params {
            importation_rate: 1.0,
            prob_surveillance_detection: 1.0,
            isolation_effectiveness: 1.0,
            burn_in_days: 20.0,
            post_burn_in_days: 40.0,
            ..short_run_params()
        };
        let mut context = setup_context(params);
        context.execute();
        let region = context.region();
        assert!(
            region.surveillance_detections + region.clinical_detections > 0,
            "certain importation with certain testing must produce detections"
        );
    }
}
