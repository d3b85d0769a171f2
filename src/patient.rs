//! Patients and their per-pathogen state machines
//!
//! A `Patient` aggregates one `PathogenState` per tracked disease,
//! index-aligned with the region's disease catalog, plus the
//! admission/discharge lifecycle and the isolation flag. Each
//! `PathogenState` is a small state machine - susceptible, colonized,
//! colonized-and-detected - driven by independently sampled exponential
//! timers whose plan handles it owns.
//!
//! Pending plans are hard-cancelled when a patient is discharged; as a
//! defensive double-check every timer callback also returns immediately if
//! its patient is no longer in the region's live map.

use std::fmt;

use rand_distr::Exp;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::disease::DiseaseId;
use crate::event_reports::{
    ClinicalDetectionRecord, DecolonizationRecord, DetectionSource, SurveillanceVerificationRecord,
};
use crate::facility::FacilityId;
use crate::log::{error, trace};
use crate::outbreak;
use crate::parameters::ContextParametersExt;
use crate::plan::PlanId;
use crate::random::ContextRandomExt;
use crate::region::ContextRegionExt;
use crate::report::ContextReportExt;

crate::random::define_rng!(DecolonizationRng);
crate::random::define_rng!(ClinicalDetectionRng);

/// Run-scoped unique patient identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientId(pub u64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-patient, per-disease colonization and detection state
#[derive(Debug)]
pub struct PathogenState {
    pub colonized: bool,
    pub detected: bool,
    pub detected_by_surveillance: bool,
    pub clinically_detected_this_stay: bool,
    /// Cumulative across stays; never reset.
    pub detection_count: u32,
    /// Colonization was present at admission rather than acquired.
    pub importation: bool,
    /// Per-patient factor multiplied into the facility force of infection.
    pub transmission_rate_contribution: f64,
    pub decolonization_plan: Option<PlanId>,
    pub clinical_detection_plan: Option<PlanId>,
}

impl PathogenState {
    #[must_use]
    pub fn new() -> PathogenState {
        PathogenState {
            colonized: false,
            detected: false,
            detected_by_surveillance: false,
            clinically_detected_this_stay: false,
            detection_count: 0,
            importation: false,
            transmission_rate_contribution: 1.0,
            decolonization_plan: None,
            clinical_detection_plan: None,
        }
    }
}

impl Default for PathogenState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Patient {
    pub id: PatientId,
    /// One state per disease, index-aligned with the region's catalog.
    pub states: Vec<PathogenState>,
    pub isolated: bool,
    pub current_facility: Option<FacilityId>,
    pub admission_time: f64,
    pub discharge_time: Option<f64>,
    pub discharge_plan: Option<PlanId>,
    pub surveillance_plan: Option<PlanId>,
}

impl Patient {
    #[must_use]
    pub fn new(id: PatientId, num_diseases: usize) -> Patient {
        Patient {
            id,
            states: (0..num_diseases).map(|_| PathogenState::new()).collect(),
            isolated: false,
            current_facility: None,
            admission_time: 0.0,
            discharge_time: None,
            discharge_plan: None,
            surveillance_plan: None,
        }
    }

    #[must_use]
    pub fn is_colonized_any(&self) -> bool {
        self.states.iter().any(|state| state.colonized)
    }

    #[must_use]
    pub fn is_detected_any(&self) -> bool {
        self.states.iter().any(|state| state.detected)
    }

    #[must_use]
    pub fn is_importation_any(&self) -> bool {
        self.states.iter().any(|state| state.importation)
    }
}

/// Susceptible -> Colonized
///
/// Samples and schedules the one-time decolonization timer and recomputes
/// the patient's transmission contributions. A no-op if the patient is
/// already colonized or no longer live.
pub fn colonize(context: &mut Context, patient_id: PatientId, disease_id: DiseaseId) {
    let mean_decolonization = {
        let region = context.region();
        match region.patient(patient_id) {
            Some(patient) if !patient.states[disease_id].colonized => {}
            _ => return,
        }
        region.diseases[disease_id].mean_decolonization_time()
    };
    let delay = context.sample_distr(
        DecolonizationRng,
        Exp::new(1.0 / mean_decolonization).unwrap(),
    );
    let time = context.get_current_time() + delay;
    let plan = context.add_plan(time, move |context| {
        decolonize(context, patient_id, disease_id);
    });
    {
        let region = context.region_mut();
        let state = &mut region
            .patient_mut(patient_id)
            .expect("patient disappeared mid-callback")
            .states[disease_id];
        state.colonized = true;
        debug_assert!(state.decolonization_plan.is_none());
        state.decolonization_plan = Some(plan);
    }
    trace!(
        "patient {patient_id} colonized with disease {disease_id}; decolonization due at t={time}"
    );
    update_transmission_contributions(context, patient_id);
    refresh_outbreak(context, patient_id, disease_id);
}

/// Fires when the decolonization timer elapses
///
/// Colonized[+Detected] -> Susceptible. Cancels any pending
/// clinical-detection timer. Detection flags are NOT cleared by
/// decolonization.
pub fn decolonize(context: &mut Context, patient_id: PatientId, disease_id: DiseaseId) {
    let pending_detection = {
        let region = context.region_mut();
        let Some(patient) = region.patient_mut(patient_id) else {
            return;
        };
        let state = &mut patient.states[disease_id];
        state.decolonization_plan = None;
        if !state.colonized {
            return;
        }
        state.colonized = false;
        state.clinical_detection_plan.take()
    };
    if let Some(plan) = pending_detection {
        context.cancel_plan(plan);
    }
    let time = context.get_current_time();
    trace!("patient {patient_id} decolonized from disease {disease_id} at t={time}");
    context.send_report(DecolonizationRecord { time, patient_id });
    update_transmission_contributions(context, patient_id);
    refresh_outbreak(context, patient_id, disease_id);
}

/// Start (or restart) the clinical-detection timer
///
/// A no-op if the patient is already detected or was already clinically
/// detected this stay. Replaces any pending clinical-detection plan.
pub fn schedule_clinical_detection(
    context: &mut Context,
    patient_id: PatientId,
    disease_id: DiseaseId,
) {
    let (facility_type, existing_plan) = {
        let region = context.region();
        let Some(patient) = region.patient(patient_id) else {
            return;
        };
        let state = &patient.states[disease_id];
        if state.detected || state.clinically_detected_this_stay {
            return;
        }
        let Some(facility_id) = patient.current_facility else {
            error!("patient {patient_id} has no current facility; clinical detection not scheduled");
            return;
        };
        (
            region.facilities[facility_id].facility_type,
            state.clinical_detection_plan,
        )
    };
    if let Some(plan) = existing_plan {
        context.cancel_plan(plan);
    }
    let mean_detection = context.region().diseases[disease_id]
        .mean_clinical_detection_time(facility_type);
    let delay = context.sample_distr(
        ClinicalDetectionRng,
        Exp::new(1.0 / mean_detection).unwrap(),
    );
    let time = context.get_current_time() + delay;
    let plan = context.add_plan(time, move |context| {
        detect_clinically(context, patient_id, disease_id);
    });
    context
        .region_mut()
        .patient_mut(patient_id)
        .expect("patient disappeared mid-callback")
        .states[disease_id]
        .clinical_detection_plan = Some(plan);
}

/// Fires when the clinical-detection timer elapses
pub fn detect_clinically(context: &mut Context, patient_id: PatientId, disease_id: DiseaseId) {
    let (detection_count, colonized) = {
        let region = context.region_mut();
        let Some(patient) = region.patient_mut(patient_id) else {
            return;
        };
        let state = &mut patient.states[disease_id];
        state.clinical_detection_plan = None;
        if state.detected || state.clinically_detected_this_stay {
            return;
        }
        state.detected = true;
        state.detected_by_surveillance = false;
        state.clinically_detected_this_stay = true;
        state.detection_count += 1;
        (state.detection_count, state.colonized)
    };
    context.region_mut().clinical_detections += 1;
    let time = context.get_current_time();
    trace!("patient {patient_id} clinically detected for disease {disease_id} at t={time}");
    context.send_report(ClinicalDetectionRecord {
        time,
        patient_id,
        detection_count,
    });
    context.send_report(SurveillanceVerificationRecord {
        time,
        patient_id,
        source: DetectionSource::Clinical,
        colonized,
        detection_count,
    });
    apply_isolation_policy(context, patient_id, disease_id);
}

/// Mark this state as detected by surveillance testing
///
/// A no-op if already detected by any source. Surveillance detection
/// pre-empts the clinical path: any pending clinical-detection plan is
/// cancelled.
pub fn detect_by_surveillance(context: &mut Context, patient_id: PatientId, disease_id: DiseaseId) {
    let (pending_detection, colonized, detection_count) = {
        let region = context.region_mut();
        let Some(patient) = region.patient_mut(patient_id) else {
            return;
        };
        let state = &mut patient.states[disease_id];
        if state.detected {
            return;
        }
        state.detected = true;
        state.detected_by_surveillance = true;
        (
            state.clinical_detection_plan.take(),
            state.colonized,
            state.detection_count,
        )
    };
    if let Some(plan) = pending_detection {
        context.cancel_plan(plan);
    }
    context.region_mut().surveillance_detections += 1;
    let time = context.get_current_time();
    trace!("patient {patient_id} detected by surveillance for disease {disease_id} at t={time}");
    context.send_report(SurveillanceVerificationRecord {
        time,
        patient_id,
        source: DetectionSource::Surveillance,
        colonized,
        detection_count,
    });
    apply_isolation_policy(context, patient_id, disease_id);
}

/// Clear the per-stay detection flags on readmission
///
/// `detection_count` is cumulative across stays and is NOT cleared. Any
/// pending clinical-detection plan is cancelled and, if the patient is
/// still colonized, a fresh one is scheduled.
pub fn reset_for_new_stay(context: &mut Context, patient_id: PatientId, disease_id: DiseaseId) {
    let (pending_detection, still_colonized) = {
        let region = context.region_mut();
        let Some(patient) = region.patient_mut(patient_id) else {
            return;
        };
        let state = &mut patient.states[disease_id];
        state.detected = false;
        state.clinically_detected_this_stay = false;
        (state.clinical_detection_plan.take(), state.colonized)
    };
    if let Some(plan) = pending_detection {
        context.cancel_plan(plan);
    }
    if still_colonized {
        schedule_clinical_detection(context, patient_id, disease_id);
    }
}

/// Place the patient under isolation precautions
///
/// Every toggle recomputes transmission contributions and the facility's
/// per-disease transmission rates so the force of infection reflects it
/// immediately.
pub fn isolate(context: &mut Context, patient_id: PatientId) {
    {
        let region = context.region_mut();
        let Some(patient) = region.patient_mut(patient_id) else {
            return;
        };
        if patient.isolated {
            return;
        }
        patient.isolated = true;
    }
    trace!("patient {patient_id} isolated");
    update_transmission_contributions(context, patient_id);
    refresh_all_outbreaks(context, patient_id);
}

/// Recompute the patient's per-disease transmission contributions
///
/// `isolated ? 1 - isolation_effectiveness : 1.0`; callers multiply this
/// per-patient factor into the facility-level force of infection.
pub fn update_transmission_contributions(context: &mut Context, patient_id: PatientId) {
    let isolation_effectiveness = context.get_params().isolation_effectiveness;
    let region = context.region_mut();
    let Some(patient) = region.patient_mut(patient_id) else {
        return;
    };
    let contribution = if patient.isolated {
        1.0 - isolation_effectiveness
    } else {
        1.0
    };
    for state in &mut patient.states {
        state.transmission_rate_contribution = contribution;
    }
}

/// Hard-cancel every pending plan owned by the patient
///
/// Called at discharge, before the patient leaves the live map.
pub(crate) fn cancel_pending_plans(context: &mut Context, patient_id: PatientId) {
    let pending = {
        let region = context.region_mut();
        let Some(patient) = region.patient_mut(patient_id) else {
            return;
        };
        let mut pending = Vec::new();
        pending.extend(patient.discharge_plan.take());
        pending.extend(patient.surveillance_plan.take());
        for state in &mut patient.states {
            pending.extend(state.decolonization_plan.take());
            pending.extend(state.clinical_detection_plan.take());
        }
        pending
    };
    for plan in pending {
        context.cancel_plan(plan);
    }
}

fn apply_isolation_policy(context: &mut Context, patient_id: PatientId, disease_id: DiseaseId) {
    let should_isolate = {
        let region = context.region();
        let Some(patient) = region.patient(patient_id) else {
            return;
        };
        region.diseases[disease_id].isolate_on_detection() && !patient.isolated
    };
    if should_isolate {
        isolate(context, patient_id);
    }
}

fn refresh_outbreak(context: &mut Context, patient_id: PatientId, disease_id: DiseaseId) {
    let facility_id = context
        .region()
        .patient(patient_id)
        .and_then(|patient| patient.current_facility);
    if let Some(facility_id) = facility_id {
        outbreak::update_transmission_rate(context, facility_id, disease_id);
    }
}

fn refresh_all_outbreaks(context: &mut Context, patient_id: PatientId) {
    let facility_id = context
        .region()
        .patient(patient_id)
        .and_then(|patient| patient.current_facility);
    let Some(facility_id) = facility_id else {
        return;
    };
    let num_diseases = context.region().diseases.len();
    for disease_id in 0..num_diseases {
        outbreak::update_transmission_rate(context, facility_id, disease_id);
    }
}
