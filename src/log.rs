//! Logging for internal simulation behavior
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`,
//! `info!`, `debug!` and `trace!`, where `error!` represents the
//! highest-priority messages and `trace!` the lowest. This is not to be
//! confused with _reporting_, which records model-level data about a run;
//! structured results always go through [`crate::report`].
//!
//! Logging is disabled by default. Enable it with [`set_log_level`] (or the
//! runner's `--log-level` flag):
//!
//! ```rust
//! use wardsim::log::{set_log_level, LevelFilter, info};
//!
//! set_log_level(LevelFilter::Info);
//! info!("A thing is being done.");
//! ```

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Enables the logger with no level filter / full logging. Equivalent to
/// `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to
/// `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level, installing the logger on first use
///
/// The logger can be installed only once per process; later calls adjust
/// the level filter on the existing logger.
pub fn set_log_level(level: LevelFilter) {
    let logger = env_logger::Builder::new().filter_level(level).build();
    // The global logger can be installed only once; if it already is, only
    // the max-level filter changes.
    let _ = log::set_boxed_logger(Box::new(logger));
    log::set_max_level(level);
}
