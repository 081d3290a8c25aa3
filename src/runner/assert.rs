//! Invariant checks performed inside actions
//!
//! A failed check is an [`ExecutionError::Assertion`] fault, recorded against
//! the task like any other action failure.

use crate::config;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{report::normalize_timestamps, Context};
use std::fs;

/// A single check
#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    Exists(String),
    NotExists(String),
    FileCount { pattern: String, equals: usize },
    Equal { left: String, right: String },
    FilesEqual { left: String, right: String, normalize: bool },
    VarSet(String),
}

impl Assertion {
    /// Create from config; an empty assertion is rejected
    pub fn from_config(config: config::Assert) -> Option<Self> {
        if let Some(path) = config.exists {
            Some(Assertion::Exists(path))
        } else if let Some(path) = config.not_exists {
            Some(Assertion::NotExists(path))
        } else if let Some(count) = config.file_count {
            Some(Assertion::FileCount {
                pattern: count.pattern,
                equals: count.equals,
            })
        } else if let Some(eq) = config.equal {
            Some(Assertion::Equal {
                left: eq.left,
                right: eq.right,
            })
        } else if let Some(files) = config.files_equal {
            Some(Assertion::FilesEqual {
                left: files.left,
                right: files.right,
                normalize: files.normalize_timestamps,
            })
        } else {
            config.var_set.map(Assertion::VarSet)
        }
    }
}

/// Check an assertion against the context
pub fn check(assertion: &Assertion, ctx: &Context) -> ExecutionResult<()> {
    match assertion {
        Assertion::Exists(path) => {
            let path = ctx.interpolate(path)?;
            if !ctx.resolve_path(&path).exists() {
                return Err(ExecutionError::assertion(format!("missing '{}'", path)));
            }
        }

        Assertion::NotExists(path) => {
            let path = ctx.interpolate(path)?;
            if ctx.resolve_path(&path).exists() {
                return Err(ExecutionError::assertion(format!(
                    "'{}' should not exist",
                    path
                )));
            }
        }

        Assertion::FileCount { pattern, equals } => {
            let pattern = ctx.interpolate(pattern)?;
            let found = count_matches(&pattern, ctx)?;
            if found != *equals {
                return Err(ExecutionError::assertion(format!(
                    "expected {} files matching '{}', found {}",
                    equals, pattern, found
                )));
            }
        }

        Assertion::Equal { left, right } => {
            let left = ctx.interpolate(left)?;
            let right = ctx.interpolate(right)?;
            if left != right {
                return Err(ExecutionError::assertion(format!(
                    "'{}' != '{}'",
                    left, right
                )));
            }
        }

        Assertion::FilesEqual {
            left,
            right,
            normalize,
        } => {
            let left = ctx.interpolate(left)?;
            let right = ctx.interpolate(right)?;
            let a = fs::read(ctx.resolve_path(&left))?;
            let b = fs::read(ctx.resolve_path(&right))?;
            let same = if *normalize {
                normalize_timestamps(&String::from_utf8_lossy(&a))
                    == normalize_timestamps(&String::from_utf8_lossy(&b))
            } else {
                a == b
            };
            if !same {
                return Err(ExecutionError::assertion(format!(
                    "'{}' differs from '{}'",
                    left, right
                )));
            }
        }

        Assertion::VarSet(name) => {
            if !ctx.state.contains(name) {
                return Err(ExecutionError::assertion(format!(
                    "variable '{}' is not set",
                    name
                )));
            }
        }
    }

    Ok(())
}

/// Number of existing files matching a glob relative to the working directory
fn count_matches(pattern: &str, ctx: &Context) -> ExecutionResult<usize> {
    let full = ctx.resolve_path(pattern);
    let paths = glob::glob(&full.to_string_lossy())
        .map_err(|e| ExecutionError::assertion(format!("bad pattern '{}': {}", pattern, e)))?;

    Ok(paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .count())
}
