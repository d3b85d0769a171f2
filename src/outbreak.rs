//! Per-facility, per-disease transmission dynamics and tallies
//!
//! A `FacilityOutbreak` tracks one disease inside one facility: the
//! facility-level transmission-rate coefficient (force of infection), the
//! monotonic transmission counter, and the running prevalence and
//! admission/discharge tallies used for end-of-run reporting.
//!
//! The coefficient is recomputed whenever the colonized or susceptible
//! population changes - admission, discharge, colonization, decolonization,
//! isolation - and the pending colonization-attempt plan is rescheduled
//! from the new rate each time. Exponential waiting times are memoryless,
//! so cancel-and-resample gives the same process as thinning.

use rand_distr::Exp;

use crate::context::Context;
use crate::disease::DiseaseId;
use crate::facility::FacilityId;
use crate::log::trace;
use crate::patient;
use crate::plan::PlanId;
use crate::random::ContextRandomExt;
use crate::region::{ContextRegionExt, RegionData};

crate::random::define_rng!(TransmissionRng);

#[derive(Debug)]
pub struct FacilityOutbreak {
    pub disease_id: DiseaseId,
    /// Per-susceptible force of infection; always >= 0.
    pub transmission_rate: f64,
    /// Monotonic count of in-facility acquisitions.
    pub transmissions_tally: u32,
    prevalence_sum: f64,
    prevalence_samples: u32,
    /// Post-burn-in admissions and how many arrived colonized.
    pub admissions_tallied: u32,
    pub colonized_admissions: u32,
    /// Post-burn-in discharges and how many left colonized.
    pub discharges_tallied: u32,
    pub colonized_discharges: u32,
    attempt_plan: Option<PlanId>,
}

impl FacilityOutbreak {
    #[must_use]
    pub fn new(disease_id: DiseaseId) -> FacilityOutbreak {
        FacilityOutbreak {
            disease_id,
            transmission_rate: 0.0,
            transmissions_tally: 0,
            prevalence_sum: 0.0,
            prevalence_samples: 0,
            admissions_tallied: 0,
            colonized_admissions: 0,
            discharges_tallied: 0,
            colonized_discharges: 0,
            attempt_plan: None,
        }
    }

    /// Record one daily colonized-fraction sample
    pub fn record_prevalence_sample(&mut self, value: f64) {
        assert!(
            (0.0..=1.0).contains(&value),
            "prevalence sample out of bounds"
        );
        self.prevalence_sum += value;
        self.prevalence_samples += 1;
    }

    /// Mean of the daily prevalence samples recorded so far
    #[must_use]
    pub fn mean_daily_prevalence(&self) -> f64 {
        if self.prevalence_samples == 0 {
            return 0.0;
        }
        self.prevalence_sum / f64::from(self.prevalence_samples)
    }

    pub fn update_admission_tally(&mut self, state: &patient::PathogenState) {
        self.admissions_tallied += 1;
        if state.colonized {
            self.colonized_admissions += 1;
        }
    }

    pub fn update_stay_tally(&mut self, state: &patient::PathogenState) {
        self.discharges_tallied += 1;
        if state.colonized {
            self.colonized_discharges += 1;
        }
    }

    /// Colonized-at-admission fraction of tallied admissions
    #[must_use]
    pub fn importation_prevalence(&self) -> f64 {
        if self.admissions_tallied == 0 {
            return 0.0;
        }
        f64::from(self.colonized_admissions) / f64::from(self.admissions_tallied)
    }

    /// Colonized-at-discharge fraction of tallied discharges
    #[must_use]
    pub fn discharge_prevalence(&self) -> f64 {
        if self.discharges_tallied == 0 {
            return 0.0;
        }
        f64::from(self.colonized_discharges) / f64::from(self.discharges_tallied)
    }
}

/// Instantaneous colonized fraction of the facility's current roster
#[must_use]
pub fn get_prevalence(region: &RegionData, facility_id: FacilityId, disease_id: DiseaseId) -> f64 {
    let facility = &region.facilities[facility_id];
    if facility.roster.is_empty() {
        return 0.0;
    }
    let colonized = facility
        .roster
        .iter()
        .filter(|patient_id| region.people[*patient_id].states[disease_id].colonized)
        .count();
    #[allow(clippy::cast_precision_loss)]
    {
        colonized as f64 / facility.roster.len() as f64
    }
}

/// Recompute the facility's force-of-infection coefficient for one disease
///
/// `beta(facility_type) * sum of colonized patients' contributions /
/// max(1, population)`. Reschedules the pending colonization attempt from
/// the new rate.
pub fn update_transmission_rate(
    context: &mut Context,
    facility_id: FacilityId,
    disease_id: DiseaseId,
) {
    let (rate, susceptible_count) = {
        let region = context.region();
        let facility = &region.facilities[facility_id];
        let beta = region.diseases[disease_id].transmission_coefficient(facility.facility_type);
        let mut colonized_weight = 0.0;
        let mut susceptible_count = 0usize;
        for patient_id in &facility.roster {
            let state = &region.people[patient_id].states[disease_id];
            if state.colonized {
                colonized_weight += state.transmission_rate_contribution;
            } else {
                susceptible_count += 1;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = beta * colonized_weight / facility.roster.len().max(1) as f64;
        (rate, susceptible_count)
    };
    debug_assert!(rate >= 0.0);
    context.region_mut().facilities[facility_id].outbreaks[disease_id].transmission_rate = rate;
    schedule_colonization_attempt(context, facility_id, disease_id, rate, susceptible_count);
}

fn schedule_colonization_attempt(
    context: &mut Context,
    facility_id: FacilityId,
    disease_id: DiseaseId,
    rate: f64,
    susceptible_count: usize,
) {
    let pending =
        context.region_mut().facilities[facility_id].outbreaks[disease_id].attempt_plan.take();
    if let Some(plan) = pending {
        context.cancel_plan(plan);
    }
    #[allow(clippy::cast_precision_loss)]
    let total_rate = rate * susceptible_count as f64;
    if total_rate <= 0.0 {
        return;
    }
    let delay = context.sample_distr(TransmissionRng, Exp::new(total_rate).unwrap());
    let time = context.get_current_time() + delay;
    let plan = context.add_plan(time, move |context| {
        attempt_colonization(context, facility_id, disease_id);
    });
    context.region_mut().facilities[facility_id].outbreaks[disease_id].attempt_plan = Some(plan);
}

/// Fires when the colonization-attempt timer elapses
///
/// Picks a uniformly random susceptible roster patient and colonizes it.
/// The resulting rate update schedules the next attempt.
fn attempt_colonization(context: &mut Context, facility_id: FacilityId, disease_id: DiseaseId) {
    context.region_mut().facilities[facility_id].outbreaks[disease_id].attempt_plan = None;

    let susceptibles: Vec<patient::PatientId> = {
        let region = context.region();
        let facility = &region.facilities[facility_id];
        facility
            .roster
            .iter()
            .copied()
            .filter(|patient_id| !region.people[patient_id].states[disease_id].colonized)
            .collect()
    };
    if susceptibles.is_empty() {
        update_transmission_rate(context, facility_id, disease_id);
        return;
    }
    let index = context.sample_range(TransmissionRng, 0..susceptibles.len());
    let victim = susceptibles[index];

    {
        let region = context.region_mut();
        region.facilities[facility_id].outbreaks[disease_id].transmissions_tally += 1;
        if !region.in_burn_in_period {
            region.post_burn_in_transmissions += 1;
        }
    }
    trace!(
        "transmission of disease {disease_id} to patient {victim} in facility {facility_id}"
    );
    patient::colonize(context, victim, disease_id);
    patient::schedule_clinical_detection(context, victim, disease_id);
}
