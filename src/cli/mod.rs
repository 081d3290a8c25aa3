//! CLI interface and argument parsing
//!
//! This module handles command-line parsing, task listings, shell
//! completion and the final run summary.

pub mod app;

// Re-export main types
pub use app::*;
