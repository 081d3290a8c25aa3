//! Task execution engine
//!
//! This module handles the task graph: registration, order resolution,
//! guarded execution of actions and the bookkeeping of each run.

pub mod assert;
pub mod command;
pub mod context;
pub mod incremental;
pub mod interpolate;
pub mod orchestrator;
pub(crate) mod parallel;
pub mod plan;
pub mod record;
pub mod report;
pub mod step;
pub mod task;
pub mod when;

// Re-export main types
pub use assert::Assertion;
pub use command::*;
pub use context::*;
pub use interpolate::*;
pub use orchestrator::*;
pub use plan::*;
pub use record::*;
pub use report::*;
pub use step::*;
pub use task::*;
pub use when::*;
