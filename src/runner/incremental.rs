//! Up-to-date checks for incremental tasks

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::Context;
use std::path::PathBuf;
use std::time::SystemTime;

/// Whether every target is at least as new as the newest source
///
/// A target pattern matching nothing, or sources matching nothing, means the
/// task has to run.
pub fn is_up_to_date(source: &[String], target: &[String], ctx: &Context) -> ExecutionResult<bool> {
    if source.is_empty() || target.is_empty() {
        return Ok(false);
    }

    let mut newest_source: Option<SystemTime> = None;
    for pattern in source {
        for path in expand(pattern, ctx)? {
            let modified = path.metadata()?.modified()?;
            newest_source = Some(newest_source.map_or(modified, |t| t.max(modified)));
        }
    }
    let Some(newest_source) = newest_source else {
        return Ok(false);
    };

    let mut oldest_target: Option<SystemTime> = None;
    for pattern in target {
        let paths = expand(pattern, ctx)?;
        if paths.is_empty() {
            return Ok(false);
        }
        for path in paths {
            let modified = path.metadata()?.modified()?;
            oldest_target = Some(oldest_target.map_or(modified, |t| t.min(modified)));
        }
    }

    Ok(oldest_target.is_some_and(|oldest| newest_source <= oldest))
}

fn expand(pattern: &str, ctx: &Context) -> ExecutionResult<Vec<PathBuf>> {
    let pattern = ctx.interpolate(pattern)?;
    let full = ctx.resolve_path(&pattern);
    let paths = glob::glob(&full.to_string_lossy())
        .map_err(|e| ExecutionError::fault(format!("bad pattern '{}': {}", pattern, e)))?;

    Ok(paths.filter_map(Result::ok).filter(|p| p.is_file()).collect())
}
