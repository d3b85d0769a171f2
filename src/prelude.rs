//! Common imports for building and driving the simulation

pub use crate::context::Context;
pub use crate::error::SimError;
pub use crate::parameters::{ContextParametersExt, FacilityConfig, Params};
pub use crate::random::ContextRandomExt;
pub use crate::region::ContextRegionExt;
pub use crate::report::ContextReportExt;
pub use crate::{create_report_trait, define_data_plugin, define_rng};
