//! buildrun - a YAML-based build task orchestrator
//!
//! Tasks declare dependencies, optional guards and an action made of steps.
//! The orchestrator resolves a target's dependency closure, runs each task at
//! most once per run, and records what succeeded, was skipped, failed or was
//! aborted. Tasks can be registered from Rust code or loaded from a
//! `buildrun.yml` file.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod runner;

// Re-export commonly used types
pub use error::{BuildError, Result};
pub use runner::{Context, Orchestrator, Scope, Step, Summary, Task};

/// Current version of buildrun
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
