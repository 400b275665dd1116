//! bundleplan library
//!
//! Build plan synthesis for server bundles: module classification, chunk
//! naming, virtual modules, externalization and aliasing.

pub mod cli;
pub mod config;
pub mod error;
pub mod plan;
pub mod plugins;
pub mod resolver;
pub mod scan;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use error::{PlanError, PlanWarning};
pub use plan::{AssembledPlan, BuildPlan, PlanAssembler};
pub use plugins::Pipeline;
