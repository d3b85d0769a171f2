//! Healthcare facilities: rosters, admissions, discharges, surveillance
//!
//! A `Facility` owns its insertion-ordered patient roster, the
//! length-of-stay distribution for its type, the Poisson admission stream
//! that keeps the census near its target, per-disease
//! [`FacilityOutbreak`](crate::outbreak::FacilityOutbreak) trackers, and
//! the active-surveillance testing configuration.

use rand_distr::Exp;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::distributions::LengthOfStay;
use crate::error::SimError;
use crate::event_reports::{AdmissionRecord, DischargeRecord};
use crate::log::trace;
use crate::outbreak::{self, FacilityOutbreak};
use crate::parameters::{ContextParametersExt, FacilityConfig, Params};
use crate::patient::{self, Patient, PatientId};
use crate::random::ContextRandomExt;
use crate::region::ContextRegionExt;
use crate::report::ContextReportExt;

crate::random::define_rng!(AdmissionRng);
crate::random::define_rng!(LosRng);
crate::random::define_rng!(ImportationRng);
crate::random::define_rng!(SurveillanceRng);

/// Index into the region's facility list.
pub type FacilityId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacilityType {
    LongTermAcuteCare,
    AcuteCare,
    NursingHome,
}

#[derive(Debug)]
pub struct Facility {
    pub id: FacilityId,
    pub facility_type: FacilityType,
    /// Current patients, in admission order.
    pub roster: Vec<PatientId>,
    /// One tracker per disease, index-aligned with the region's catalog.
    pub outbreaks: Vec<FacilityOutbreak>,
    pub target_population: u32,
    pub mean_los: f64,
    /// New-patient arrivals per day; sized to hold the census at target.
    pub admission_rate: f64,
    los: LengthOfStay,
    pub active_surveillance: bool,
    /// Days between mid-stay surveillance tests; `None` disables them.
    pub time_between_tests: Option<f64>,
    /// Lifetime admissions, burn-in included.
    pub total_admissions: u32,
    /// Post-burn-in patient-days accumulated at discharge.
    pub patient_days: f64,
    population_sum: f64,
    population_samples: u32,
}

impl Facility {
    /// Build a facility from its configuration
    ///
    /// Long-term acute care uses the two-component gamma-mixture stay fit;
    /// every other type falls back to an exponential stay at the mixture's
    /// mean, so no facility type is ever left without a discharge
    /// schedule.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameter` if the stay distribution
    /// cannot be constructed from the parameters.
    pub fn new(id: FacilityId, config: FacilityConfig, params: &Params) -> Result<Facility, SimError> {
        let mixture = LengthOfStay::mixed_gamma(
            params.los_shape1,
            params.los_scale1,
            params.los_shape2,
            params.los_scale2,
            params.los_prob1,
        )?;
        let los = match config.facility_type {
            FacilityType::LongTermAcuteCare => mixture,
            FacilityType::AcuteCare | FacilityType::NursingHome => {
                LengthOfStay::exponential(mixture.mean())?
            }
        };
        let mean_los = los.mean();
        Ok(Facility {
            id,
            facility_type: config.facility_type,
            roster: Vec::new(),
            outbreaks: Vec::new(),
            target_population: config.size,
            mean_los,
            admission_rate: f64::from(config.size) / mean_los,
            los,
            active_surveillance: false,
            time_between_tests: None,
            total_admissions: 0,
            patient_days: 0.0,
            population_sum: 0.0,
            population_samples: 0,
        })
    }

    #[must_use]
    pub fn population_size(&self) -> usize {
        self.roster.len()
    }

    pub fn record_population_sample(&mut self, population: usize) {
        #[allow(clippy::cast_precision_loss)]
        {
            self.population_sum += population as f64;
        }
        self.population_samples += 1;
    }

    #[must_use]
    pub fn average_population(&self) -> f64 {
        if self.population_samples == 0 {
            return 0.0;
        }
        self.population_sum / f64::from(self.population_samples)
    }

    /// Turn on active surveillance with the given days between mid-stay
    /// tests
    pub fn start_active_surveillance(&mut self, days_between_tests: f64) {
        self.active_surveillance = true;
        self.time_between_tests = Some(days_between_tests);
    }
}

/// Construct a new patient, seed colonization per the importation policy,
/// and admit it
pub fn admit_new_patient(context: &mut Context, facility_id: FacilityId) {
    let patient_id = create_patient(context, facility_id);
    admit_patient(context, facility_id, patient_id);
}

/// Admit an existing patient: roster, discharge timer, surveillance
/// testing, detection timers, transmission bookkeeping
pub fn admit_patient(context: &mut Context, facility_id: FacilityId, patient_id: PatientId) {
    let now = context.get_current_time();
    let (num_diseases, in_burn_in) = {
        let region = context.region();
        (region.diseases.len(), region.in_burn_in_period)
    };
    let (active_surveillance, periodic_tests, importation) = {
        let region = context.region_mut();
        let facility = &mut region.facilities[facility_id];
        facility.roster.push(patient_id);
        facility.total_admissions += 1;
        let active_surveillance = facility.active_surveillance;
        let periodic_tests = facility.time_between_tests.is_some();
        let patient = region
            .patient_mut(patient_id)
            .expect("admitted patient must be live");
        patient.current_facility = Some(facility_id);
        patient.admission_time = now;
        (active_surveillance, periodic_tests, patient.is_importation_any())
    };
    context.send_report(AdmissionRecord {
        time: now,
        patient_id,
        importation,
    });
    trace!("admitting patient {patient_id} to facility {facility_id} at t={now}");

    let los = random_los(context, facility_id);
    start_discharge_timer(context, facility_id, patient_id, los);

    let admission_adherence = context.get_params().admission_surveillance_adherence;
    for disease_id in 0..num_diseases {
        let (colonized, test_probability) = {
            let region = context.region();
            let disease = &region.diseases[disease_id];
            let state = &region.people[&patient_id].states[disease_id];
            let eligible = active_surveillance && disease.is_surveillance_target();
            (
                state.colonized,
                if eligible {
                    disease.surveillance_detection_probability() * admission_adherence
                } else {
                    0.0
                },
            )
        };
        if !colonized {
            continue;
        }
        if test_probability > 0.0 && context.sample_bool(SurveillanceRng, test_probability) {
            patient::detect_by_surveillance(context, patient_id, disease_id);
        }
        patient::schedule_clinical_detection(context, patient_id, disease_id);
    }

    let isolated = context.region().people[&patient_id].isolated;
    if active_surveillance && periodic_tests && !isolated {
        perform_surveillance_test(context, patient_id);
        schedule_next_surveillance_test(context, facility_id, patient_id);
    }

    patient::update_transmission_contributions(context, patient_id);
    for disease_id in 0..num_diseases {
        outbreak::update_transmission_rate(context, facility_id, disease_id);
    }

    if !in_burn_in {
        let region = context.region_mut();
        let facility = &mut region.facilities[facility_id];
        let patient = &region.people[&patient_id];
        for (disease_id, outbreak) in facility.outbreaks.iter_mut().enumerate() {
            outbreak.update_admission_tally(&patient.states[disease_id]);
        }
    }
}

/// Remove a patient from the facility and the live agent set
///
/// Pending plans are hard-cancelled, so in-flight timers never act on a
/// discharged patient.
pub fn discharge_patient(context: &mut Context, facility_id: FacilityId, patient_id: PatientId) {
    let now = context.get_current_time();
    let in_burn_in = context.region().in_burn_in_period;
    let admission_time = {
        let region = context.region_mut();
        let facility = &mut region.facilities[facility_id];
        let position = facility
            .roster
            .iter()
            .position(|id| *id == patient_id)
            .expect("discharged patient must be on the roster");
        facility.roster.remove(position);
        let patient = region
            .patient_mut(patient_id)
            .expect("discharged patient must be live");
        patient.discharge_time = Some(now);
        patient.current_facility = None;
        patient.admission_time
    };
    trace!("discharging patient {patient_id} from facility {facility_id} at t={now}");

    if !in_burn_in {
        let (colonized, detected) = {
            let region = context.region_mut();
            let facility = &mut region.facilities[facility_id];
            facility.patient_days += now - admission_time;
            let patient = &region.people[&patient_id];
            for (disease_id, outbreak) in facility.outbreaks.iter_mut().enumerate() {
                outbreak.update_stay_tally(&patient.states[disease_id]);
            }
            (patient.is_colonized_any(), patient.is_detected_any())
        };
        context.send_report(DischargeRecord {
            time: now,
            patient_id,
            admission_time,
            length_of_stay: now - admission_time,
            colonized,
            detected,
        });
    }

    patient::cancel_pending_plans(context, patient_id);
    context.region_mut().people.remove(&patient_id);

    let num_diseases = context.region().diseases.len();
    for disease_id in 0..num_diseases {
        outbreak::update_transmission_rate(context, facility_id, disease_id);
    }
}

/// Seed one patient during burn-in setup
///
/// Skips surveillance testing and admission tallies; the discharge time is
/// a plain exponential at the facility's mean stay so the census relaxes
/// toward its target instead of every seed leaving on the same schedule.
pub fn admit_initial_patient(context: &mut Context, facility_id: FacilityId) {
    let now = context.get_current_time();
    let patient_id = create_patient(context, facility_id);
    let (num_diseases, mean_los) = {
        let region = context.region_mut();
        let facility = &mut region.facilities[facility_id];
        facility.roster.push(patient_id);
        let mean_los = facility.mean_los;
        let patient = region
            .patient_mut(patient_id)
            .expect("seeded patient must be live");
        patient.current_facility = Some(facility_id);
        patient.admission_time = now;
        (patient.states.len(), mean_los)
    };
    let los = context.sample_distr(LosRng, Exp::new(1.0 / mean_los).unwrap());
    start_discharge_timer(context, facility_id, patient_id, los);

    for disease_id in 0..num_diseases {
        if context.region().people[&patient_id].states[disease_id].colonized {
            patient::schedule_clinical_detection(context, patient_id, disease_id);
        }
    }
    patient::update_transmission_contributions(context, patient_id);
    for disease_id in 0..num_diseases {
        outbreak::update_transmission_rate(context, facility_id, disease_id);
    }
}

/// Sample a length of stay from the facility's distribution
pub fn random_los(context: &mut Context, facility_id: FacilityId) -> f64 {
    let los = context.region().facilities[facility_id].los;
    context.sample_distr(LosRng, los)
}

/// Schedule the one-time discharge callback at `now + los`
pub fn start_discharge_timer(
    context: &mut Context,
    facility_id: FacilityId,
    patient_id: PatientId,
    los: f64,
) {
    let time = context.get_current_time() + los;
    let plan = context.add_plan(time, move |context| {
        if let Some(patient) = context.region_mut().patient_mut(patient_id) {
            patient.discharge_plan = None;
        } else {
            return;
        }
        discharge_patient(context, facility_id, patient_id);
    });
    context
        .region_mut()
        .patient_mut(patient_id)
        .expect("patient must be live to start a discharge timer")
        .discharge_plan = Some(plan);
}

/// Keep the Poisson admission stream running
///
/// Exponential inter-arrival times at the facility's admission rate; each
/// arrival admits a new patient and re-arms the stream.
pub fn schedule_next_admission(context: &mut Context, facility_id: FacilityId) {
    let rate = context.region().facilities[facility_id].admission_rate;
    let delay = context.sample_distr(AdmissionRng, Exp::new(rate).unwrap());
    let time = context.get_current_time() + delay;
    context.add_plan(time, move |context| {
        admit_new_patient(context, facility_id);
        schedule_next_admission(context, facility_id);
    });
}

/// Swab the patient for every surveillance-target disease
///
/// Each colonized, not-yet-detected target is detected with probability
/// `surveillance_detection_probability * midstay_surveillance_adherence`.
pub fn perform_surveillance_test(context: &mut Context, patient_id: PatientId) {
    let num_diseases = context.region().diseases.len();
    let adherence = context.get_params().midstay_surveillance_adherence;
    for disease_id in 0..num_diseases {
        let test_probability = {
            let region = context.region();
            let Some(patient) = region.patient(patient_id) else {
                return;
            };
            let state = &patient.states[disease_id];
            let disease = &region.diseases[disease_id];
            if state.colonized && !state.detected && disease.is_surveillance_target() {
                disease.surveillance_detection_probability() * adherence
            } else {
                0.0
            }
        };
        if test_probability > 0.0 && context.sample_bool(SurveillanceRng, test_probability) {
            patient::detect_by_surveillance(context, patient_id, disease_id);
        }
    }
}

/// Arm the next periodic mid-stay surveillance test for one patient
///
/// The chain stops when the patient is discharged or isolated.
pub fn schedule_next_surveillance_test(
    context: &mut Context,
    facility_id: FacilityId,
    patient_id: PatientId,
) {
    let Some(interval) = context.region().facilities[facility_id].time_between_tests else {
        return;
    };
    let time = context.get_current_time() + interval;
    let plan = context.add_plan(time, move |context| {
        let isolated = {
            let region = context.region_mut();
            let Some(patient) = region.patient_mut(patient_id) else {
                return;
            };
            patient.surveillance_plan = None;
            patient.isolated
        };
        if isolated {
            return;
        }
        perform_surveillance_test(context, patient_id);
        let still_in_rotation = context
            .region()
            .patient(patient_id)
            .is_some_and(|patient| !patient.isolated);
        if still_in_rotation {
            schedule_next_surveillance_test(context, facility_id, patient_id);
        }
    });
    context
        .region_mut()
        .patient_mut(patient_id)
        .expect("patient must be live to schedule surveillance")
        .surveillance_plan = Some(plan);
}

/// Daily census bookkeeping: running average population plus a prevalence
/// sample for every outbreak
pub fn update_population_tally(context: &mut Context, facility_id: FacilityId) {
    let num_diseases = context.region().diseases.len();
    let mut samples = Vec::with_capacity(num_diseases);
    {
        let region = context.region();
        for disease_id in 0..num_diseases {
            samples.push(outbreak::get_prevalence(region, facility_id, disease_id));
        }
    }
    let region = context.region_mut();
    let population = region.facilities[facility_id].roster.len();
    let facility = &mut region.facilities[facility_id];
    facility.record_population_sample(population);
    for (disease_id, value) in samples.into_iter().enumerate() {
        facility.outbreaks[disease_id].record_prevalence_sample(value);
    }
}

/// Construct a patient destined for the facility, seeding each disease
/// state from the importation policy
fn create_patient(context: &mut Context, facility_id: FacilityId) -> PatientId {
    let (num_diseases, in_burn_in) = {
        let region = context.region();
        (region.diseases.len(), region.in_burn_in_period)
    };
    let patient_id = {
        let region = context.region_mut();
        let patient_id = region.new_patient_id();
        let mut patient = Patient::new(patient_id, num_diseases);
        patient.current_facility = Some(facility_id);
        region.people.insert(patient_id, patient);
        patient_id
    };
    for disease_id in 0..num_diseases {
        let (probability, allowed) = {
            let region = context.region();
            let disease = &region.diseases[disease_id];
            (
                disease.importation_probability(),
                !in_burn_in || disease.allow_importation_during_burn_in(),
            )
        };
        if allowed && probability > 0.0 && context.sample_bool(ImportationRng, probability) {
            {
                let region = context.region_mut();
                region
                    .patient_mut(patient_id)
                    .expect("newly created patient must be live")
                    .states[disease_id]
                    .importation = true;
            }
            if in_burn_in {
                context.region_mut().colonized_admissions_during_burn_in += 1;
            }
            patient::colonize(context, patient_id, disease_id);
        }
    }
    patient_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{ContextParametersExt, FacilityConfig, Params};
    use crate::region::{self, ContextRegionExt};

    fn setup_context(params: Params) -> Context {
        let mut context = Context::new();
        let seed = params.seed;
        context.set_parameters(params).unwrap();
        context.init_random(seed);
        region::init(&mut context).unwrap();
        context
    }

    fn small_params() -> Params {
        Params {
            facilities: vec![FacilityConfig {
                size: 10,
                facility_type: FacilityType::LongTermAcuteCare,
            }],
            importation_rate: 0.0,
            ..Params::default()
        }
    }

    #[test]
    fn every_facility_type_has_a_stay_distribution() {
        let params = Params::default();
        for facility_type in [
            FacilityType::LongTermAcuteCare,
            FacilityType::AcuteCare,
            FacilityType::NursingHome,
        ] {
            let facility = Facility::new(
                0,
                FacilityConfig {
                    size: 50,
                    facility_type,
                },
                &params,
            )
            .unwrap();
            assert!(facility.mean_los > 0.0);
            assert!(facility.admission_rate > 0.0);
        }
    }

    #[test]
    fn mixture_mean_matches_stay_fit() {
        let params = Params::default();
        let facility = Facility::new(
            0,
            FacilityConfig {
                size: 75,
                facility_type: FacilityType::LongTermAcuteCare,
            },
            &params,
        )
        .unwrap();
        // The empirical fit targets a ~27.12-day mean stay.
        assert!((facility.mean_los - 27.12).abs() < 0.01);
    }

    #[test]
    fn admission_grows_roster_by_exactly_one() {
        let mut context = setup_context(small_params());
        let before = context.region().facilities[0].roster.len();
        admit_new_patient(&mut context, 0);
        let region = context.region();
        assert_eq!(region.facilities[0].roster.len(), before + 1);
        assert_eq!(region.people.len(), before + 1);
    }

    #[test]
    fn discharge_shrinks_roster_by_exactly_one() {
        let mut context = setup_context(small_params());
        let patient_id = context.region().facilities[0].roster[0];
        let before = context.region().facilities[0].roster.len();
        discharge_patient(&mut context, 0, patient_id);
        let region = context.region();
        assert_eq!(region.facilities[0].roster.len(), before - 1);
        assert_eq!(region.people.len(), before - 1);
        assert!(!region.facilities[0].roster.contains(&patient_id));
    }

    #[test]
    fn roster_conservation_over_admissions_and_discharges() {
        let mut context = setup_context(small_params());
        for _ in 0..20 {
            admit_new_patient(&mut context, 0);
        }
        for _ in 0..15 {
            let patient_id = context.region().facilities[0].roster[0];
            discharge_patient(&mut context, 0, patient_id);
        }
        let region = context.region();
        let roster_total: usize = region.facilities.iter().map(|f| f.roster.len()).sum();
        assert_eq!(roster_total, region.people.len());
    }

    #[test]
    fn discharged_patient_has_no_pending_plans() {
        let mut context = setup_context(small_params());
        let patient_id = context.region().facilities[0].roster[0];
        patient::colonize(&mut context, patient_id, 0);
        patient::schedule_clinical_detection(&mut context, patient_id, 0);
        discharge_patient(&mut context, 0, patient_id);
        // The patient left the live set; executing the rest of the queue
        // must not panic on stale handles.
        assert!(context.region().patient(patient_id).is_none());
    }

    #[test]
    fn admission_surveillance_detects_colonized_importations() {
        let params = Params {
            importation_rate: 1.0,
            prob_surveillance_detection: 1.0,
            admission_surveillance_adherence: 1.0,
            isolation_effectiveness: 1.0,
            ..small_params()
        };
        let mut context = setup_context(params);
        {
            let region = context.region_mut();
            region.in_burn_in_period = false;
            let days_between_tests = 14.0;
            for facility in &mut region.facilities {
                facility.start_active_surveillance(days_between_tests);
            }
        }
        admit_new_patient(&mut context, 0);
        let region = context.region();
        let patient_id = *region.facilities[0].roster.last().unwrap();
        let patient = &region.people[&patient_id];
        assert!(patient.states[0].colonized);
        assert!(patient.states[0].detected);
        assert!(patient.states[0].detected_by_surveillance);
        assert!(patient.isolated);
        assert_eq!(patient.states[0].transmission_rate_contribution, 0.0);
    }

    #[test]
    fn admission_tallies_suppressed_during_burn_in() {
        let params = Params {
            importation_rate: 1.0,
            ..small_params()
        };
        let mut context = setup_context(params);
        assert!(context.region().in_burn_in_period);
        admit_new_patient(&mut context, 0);
        assert_eq!(context.region().facilities[0].outbreaks[0].admissions_tallied, 0);

        context.region_mut().in_burn_in_period = false;
        admit_new_patient(&mut context, 0);
        let outbreak = &context.region().facilities[0].outbreaks[0];
        assert_eq!(outbreak.admissions_tallied, 1);
        assert_eq!(outbreak.colonized_admissions, 1);
    }

    #[test]
    fn importation_prevalence_tracks_colonized_admissions() {
        let params = Params {
            importation_rate: 1.0,
            ..small_params()
        };
        let mut context = setup_context(params);
        context.region_mut().in_burn_in_period = false;
        for _ in 0..10 {
            admit_new_patient(&mut context, 0);
        }
        let outbreak = &context.region().facilities[0].outbreaks[0];
        assert_eq!(outbreak.importation_prevalence(), 1.0);
    }

    #[test]
    fn population_tally_records_prevalence_samples() {
        let mut context = setup_context(small_params());
        let patient_id = context.region().facilities[0].roster[0];
        patient::colonize(&mut context, patient_id, 0);
        update_population_tally(&mut context, 0);
        let facility = &context.region().facilities[0];
        assert_eq!(facility.average_population(), 10.0);
        assert!((facility.outbreaks[0].mean_daily_prevalence() - 0.1).abs() < 1e-12);
    }
}
