//! Typed report records for simulation events
//!
//! One CSV file per record type, mirroring the run outputs: admissions,
//! decolonizations, clinical detections, a detection-source verification
//! log, discharged-patient records, the daily census, and the end-of-run
//! summary.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::SimError;
use crate::patient::PatientId;
use crate::report::ContextReportExt;

/// How a detection was made; both sources lead to the same detected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionSource {
    Clinical,
    Surveillance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub time: f64,
    pub patient_id: PatientId,
    /// Colonization present at admission rather than acquired in-house.
    pub importation: bool,
}
crate::report::create_report_trait!(AdmissionRecord);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecolonizationRecord {
    pub time: f64,
    pub patient_id: PatientId,
}
crate::report::create_report_trait!(DecolonizationRecord);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalDetectionRecord {
    pub time: f64,
    pub patient_id: PatientId,
    /// Cumulative across the patient's stays.
    pub detection_count: u32,
}
crate::report::create_report_trait!(ClinicalDetectionRecord);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveillanceVerificationRecord {
    pub time: f64,
    pub patient_id: PatientId,
    pub source: DetectionSource,
    pub colonized: bool,
    pub detection_count: u32,
}
crate::report::create_report_trait!(SurveillanceVerificationRecord);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeRecord {
    pub time: f64,
    pub patient_id: PatientId,
    pub admission_time: f64,
    pub length_of_stay: f64,
    pub colonized: bool,
    pub detected: bool,
}
crate::report::create_report_trait!(DischargeRecord);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCensusRecord {
    pub time: f64,
    pub facility_id: usize,
    pub disease_id: usize,
    pub population: u32,
    pub colonized: u32,
    pub detected: u32,
    pub isolated: u32,
}
crate::report::create_report_trait!(DailyCensusRecord);

/// End-of-run statistics, one row per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub surveillance_after_burn_in: bool,
    pub isolation_effectiveness: f64,
    pub days_between_tests: f64,
    pub clinical_detections: u32,
    pub surveillance_detections: u32,
    pub mean_daily_prevalence: f64,
    pub mean_discharge_prevalence: f64,
    pub importation_prevalence: f64,
    pub transmissions: u32,
    pub transmissions_post_burn_in: u32,
    pub total_admissions: u32,
    pub admissions_at_burn_in_end: u32,
    pub colonized_admissions_during_burn_in: u32,
}
crate::report::create_report_trait!(SummaryRecord);

/// Register every report type with the context
///
/// # Errors
///
/// Returns an error if a report file cannot be created.
pub fn init(context: &mut Context) -> Result<(), SimError> {
    context.add_report::<AdmissionRecord>("admissions")?;
    context.add_report::<DecolonizationRecord>("decolonization")?;
    context.add_report::<ClinicalDetectionRecord>("clinical_detection")?;
    context.add_report::<SurveillanceVerificationRecord>("detection_verification")?;
    context.add_report::<DischargeRecord>("discharged_patients")?;
    context.add_report::<DailyCensusRecord>("daily_census")?;
    context.add_report::<SummaryRecord>("simulation_results")?;
    Ok(())
}
