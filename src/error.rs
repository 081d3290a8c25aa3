//! Error types for buildrun

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for buildrun operations
pub type Result<T> = std::result::Result<T, BuildError>;

/// Main error type for buildrun
#[derive(Error, Debug)]
pub enum BuildError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task graph and run bookkeeping errors
    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Faults raised while executing an action outside a run
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find build file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Task '{0}': source cannot be defined without target")]
    SourceWithoutTarget(String),

    #[error("Task '{0}': target cannot be defined without source")]
    TargetWithoutSource(String),

    #[error("Invalid type '{kind}' for parameter '{name}'")]
    InvalidParamType { name: String, kind: String },

    #[error("Invalid value for parameter '{name}': {error}")]
    InvalidParamValue { name: String, error: String },

    #[error("Parameter '{0}' is required but not provided")]
    MissingParam(String),

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },

    #[error("Failed to load env file '{path}': {error}")]
    EnvFile { path: PathBuf, error: String },
}

/// Errors raised by the orchestrator itself, never by task actions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Task '{0}' is not defined")]
    UnknownTask(String),

    #[error("Task '{task}' depends on undefined task '{dependency}'")]
    MissingDependency { task: String, dependency: String },

    #[error("No run has completed yet")]
    RunNotComplete,
}

impl OrchestratorError {
    /// Names of the tasks on a detected cycle, without the closing repeat
    pub fn cycle_members(&self) -> &[String] {
        match self {
            OrchestratorError::CyclicDependency { cycle } if cycle.len() > 1 => {
                &cycle[..cycle.len() - 1]
            }
            _ => &[],
        }
    }
}

/// A fault raised by a task action, guard or step
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Command '{command}' failed with exit code {code:?}")]
    ExternalProcess { command: String, code: Option<i32> },

    #[error("Failed to start '{command}': {error}")]
    Spawn { command: String, error: String },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("{0}")]
    Interpolation(#[from] InterpolationError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Fault(String),
}

impl ExecutionError {
    /// Free-form fault, the usual way for closures to fail
    pub fn fault(message: impl Into<String>) -> Self {
        ExecutionError::Fault(message.into())
    }

    /// Failed invariant check
    pub fn assertion(message: impl Into<String>) -> Self {
        ExecutionError::Assertion(message.into())
    }
}

impl From<io::Error> for ExecutionError {
    fn from(err: io::Error) -> Self {
        ExecutionError::Io(err.to_string())
    }
}

/// Variable interpolation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for orchestrator operations
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;
