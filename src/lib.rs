//! A discrete-event simulation of pathogen transmission in healthcare
//! facilities
//!
//! Wardsim models a facility (or a small network of facilities) admitting
//! and discharging patients on sampled schedules while a pathogen spreads
//! through the resident population. Each patient carries one state machine
//! per tracked pathogen (colonized, detected, isolated, decolonized), driven
//! by independent exponential timers contending on a shared simulated clock.
//! Facility-level transmission-rate coefficients are recomputed whenever the
//! colonized or susceptible population changes, and running tallies
//! (prevalence, patient-days, admissions, discharges, transmissions) are
//! maintained for end-of-run reporting.
//!
//! The central object is the [`context::Context`], which owns the plan queue
//! and the simulation clock. All of the model-specific logic lives in
//! modules that rely on the `Context` for core services:
//! * Maintaining a notion of time for the simulation
//! * Scheduling events to occur at some point in the future and executing
//!   them at that time
//! * Holding module-specific data so that the module and other modules can
//!   access it
//!
//! The model modules are:
//! * [`disease`] - the immutable per-pathogen parameter catalog.
//! * [`patient`] - patient lifecycle and the per-pathogen state machine.
//! * [`outbreak`] - per-facility per-pathogen transmission dynamics and
//!   tallies.
//! * [`facility`] - roster management, admission/discharge orchestration,
//!   and surveillance testing.
//! * [`region`] - facility set, burn-in phase, and cross-facility
//!   aggregates.

pub mod context;
pub mod disease;
pub mod distributions;
pub mod error;
pub mod event_reports;
pub mod facility;
pub mod log;
pub mod outbreak;
pub mod parameters;
pub mod patient;
pub mod plan;
pub mod random;
pub mod region;
pub mod report;
pub mod runner;

pub mod prelude;

pub use error::SimError;
