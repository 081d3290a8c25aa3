//! When condition evaluation
//!
//! Build-file guards: a task (or a single run item) carries a list of
//! conditions that must all hold.

use crate::config;
use crate::error::ExecutionResult;
use crate::runner::{check_command, Context};
use std::env;

/// Runtime representation of a when condition
#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub condition: WhenCondition,
}

/// Types of when conditions
#[derive(Debug, Clone, PartialEq)]
pub enum WhenCondition {
    Equal { left: String, right: String },
    NotEqual { left: String, right: String },
    Command(String),
    Exists(String),
    EnvSet(String),
    EnvNotSet(String),
    VarSet(String),
    VarNotSet(String),
    Always,
}

impl When {
    pub fn new(condition: WhenCondition) -> Self {
        When { condition }
    }

    pub fn from_config(config: config::When) -> Self {
        // First key present wins
        let condition = if let Some(eq) = config.equal {
            WhenCondition::Equal {
                left: eq.left,
                right: eq.right,
            }
        } else if let Some(ne) = config.not_equal {
            WhenCondition::NotEqual {
                left: ne.left,
                right: ne.right,
            }
        } else if let Some(cmd) = config.command {
            WhenCondition::Command(cmd)
        } else if let Some(path) = config.exists {
            WhenCondition::Exists(path)
        } else if let Some(var) = config.env_set {
            WhenCondition::EnvSet(var)
        } else if let Some(var) = config.env_not_set {
            WhenCondition::EnvNotSet(var)
        } else if let Some(var) = config.var_set {
            WhenCondition::VarSet(var)
        } else if let Some(var) = config.var_not_set {
            WhenCondition::VarNotSet(var)
        } else {
            WhenCondition::Always
        };

        When { condition }
    }
}

/// Evaluate a list of when conditions (all must be true - AND logic)
pub fn evaluate_when_list(when_list: &[When], ctx: &Context) -> ExecutionResult<bool> {
    for when in when_list {
        if !evaluate_when(when, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluate a single when condition
pub fn evaluate_when(when: &When, ctx: &Context) -> ExecutionResult<bool> {
    let expand = |s: &str| -> ExecutionResult<String> { Ok(ctx.interpolate(s)?) };

    match &when.condition {
        WhenCondition::Always => Ok(true),

        WhenCondition::Equal { left, right } => Ok(expand(left)? == expand(right)?),

        WhenCondition::NotEqual { left, right } => Ok(expand(left)? != expand(right)?),

        WhenCondition::Command(cmd) => check_command(cmd, ctx),

        WhenCondition::Exists(path) => Ok(ctx.resolve_path(&expand(path)?).exists()),

        WhenCondition::EnvSet(var) => Ok(env::var(expand(var)?).is_ok()),

        WhenCondition::EnvNotSet(var) => Ok(env::var(expand(var)?).is_err()),

        WhenCondition::VarSet(var) => Ok(ctx.state.contains(var)),

        WhenCondition::VarNotSet(var) => Ok(!ctx.state.contains(var)),
    }
}
