//! Execution context for a run
//!
//! One `Context` is created when a run starts and dropped when it ends. Every
//! guard and step receives it by reference; the build state inside is the only
//! mutable part and is synchronized so parallel workers can share it.

use crate::error::InterpolationResult;
use crate::runner::interpolate::{interpolate, interpolate_strict};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    #[default]
    Normal = 2,
    Verbose = 3,
}

/// Key/value state shared by all actions of one run
#[derive(Debug, Default)]
pub struct BuildState {
    vars: RwLock<HashMap<String, String>>,
}

impl BuildState {
    pub fn new(vars: HashMap<String, String>) -> Self {
        BuildState {
            vars: RwLock::new(vars),
        }
    }

    // A panicking action cannot leave the map half-written, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.vars.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.vars.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.write().remove(key)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.read().clone()
    }

    /// Run `f` with a consistent view of the state
    pub fn with_vars<T>(&self, f: impl FnOnce(&HashMap<String, String>) -> T) -> T {
        f(&self.read())
    }
}

/// Execution context that tracks state during a run
#[derive(Debug)]
pub struct Context {
    /// Directory commands run in and relative paths resolve against
    pub working_dir: PathBuf,

    /// Mutable build state
    pub state: BuildState,

    /// Run parameters as given on the command line
    pub params: HashMap<String, String>,

    /// Shell interpreter (e.g., ["bash", "-c"])
    pub interpreter: Vec<String>,

    /// Verbosity level
    pub verbosity: Verbosity,
}

impl Context {
    /// Create a new context with default settings
    pub fn new() -> Self {
        Context {
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            state: BuildState::default(),
            params: HashMap::new(),
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            verbosity: Verbosity::Normal,
        }
    }

    /// Create a context with a specific working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Replace the build state
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.state = BuildState::new(vars);
        self
    }

    /// Record run parameters; they also become build state entries
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        for (key, value) in &params {
            self.state.set(key.clone(), value.clone());
        }
        self.params = params;
        self
    }

    /// Set the interpreter
    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        if !interpreter.is_empty() {
            self.interpreter = interpreter;
        }
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set a build state variable
    pub fn set_var(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.set(key, value);
    }

    /// Get a build state variable
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.state.get(key)
    }

    /// Get a run parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Boolean view of a parameter ("true", "1", "yes")
    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.param(key).map(str::to_ascii_lowercase).as_deref(),
            Some("true" | "1" | "yes")
        )
    }

    /// Expand `${var}` references against the build state
    pub fn interpolate(&self, s: &str) -> InterpolationResult<String> {
        self.state.with_vars(|vars| interpolate(s, vars))
    }

    /// Expand `${var}` references, rejecting unknown names
    pub fn interpolate_strict(&self, s: &str) -> InterpolationResult<String> {
        self.state.with_vars(|vars| interpolate_strict(s, vars))
    }

    /// Resolve a possibly relative path against the working directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.working_dir.join(path)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
