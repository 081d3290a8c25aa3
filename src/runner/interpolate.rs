//! Variable interpolation for strings
//!
//! Replaces `${name}` references with build state values, falling back to the
//! process environment.

use crate::error::{InterpolationError, InterpolationResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::env;
use std::sync::LazyLock;

static VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid interpolation pattern"));

/// Upper bound on expansion passes over one string
const MAX_PASSES: usize = 32;

/// Interpolate variables in a string
///
/// Unknown names are left as written.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let mut result = s.to_string();

    // Values may themselves contain references
    for _ in 0..MAX_PASSES {
        let mut changed = false;

        result = VAR_PATTERN
            .replace_all(&result, |caps: &Captures| {
                let name = &caps[1];
                match vars.get(name).cloned().or_else(|| env::var(name).ok()) {
                    Some(value) => {
                        changed = true;
                        value
                    }
                    None => caps[0].to_string(),
                }
            })
            .into_owned();

        if !changed {
            return Ok(result);
        }
    }

    Err(InterpolationError::RecursiveInterpolation)
}

/// Interpolate with strict mode - errors on undefined variables
pub fn interpolate_strict(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let result = interpolate(s, vars)?;

    if let Some(caps) = VAR_PATTERN.captures(&result) {
        return Err(InterpolationError::UndefinedVariable(caps[1].to_string()));
    }

    Ok(result)
}
