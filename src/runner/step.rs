//! Steps: the pieces a task action is made of
//!
//! A step is either named or anonymous. Steps may run further steps through
//! their [`Scope`]; every step, however deeply nested, lands in the owning
//! task's ledger and never becomes a task of its own.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::Context;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Body of a step
pub type StepFn = Arc<dyn Fn(&mut Scope<'_>) -> ExecutionResult<()> + Send + Sync>;

/// A unit of work inside a task action
#[derive(Clone)]
pub enum Step {
    Named { name: String, body: StepFn },
    Anonymous(StepFn),
}

impl Step {
    pub fn named<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> ExecutionResult<()> + Send + Sync + 'static,
    {
        Step::Named {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn anonymous<F>(body: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> ExecutionResult<()> + Send + Sync + 'static,
    {
        Step::Anonymous(Arc::new(body))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Step::Named { name, .. } => Some(name),
            Step::Anonymous(_) => None,
        }
    }

    fn body(&self) -> &StepFn {
        match self {
            Step::Named { body, .. } | Step::Anonymous(body) => body,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Named { name, .. } => write!(f, "Step::Named({})", name),
            Step::Anonymous(_) => write!(f, "Step::Anonymous"),
        }
    }
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
}

/// Ledger entry for one executed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Step name, or `#n` for anonymous steps
    pub label: String,
    /// 0 for top-level steps of the task
    pub depth: usize,
    pub outcome: StepOutcome,
    pub duration: Duration,
}

/// Handle given to a running step
pub struct Scope<'a> {
    ctx: &'a Context,
    task: &'a str,
    depth: usize,
    prefix: &'static str,
    records: Vec<StepRecord>,
    warnings: Vec<String>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(ctx: &'a Context, task: &'a str) -> Self {
        Scope {
            ctx,
            task,
            depth: 0,
            prefix: "",
            records: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The run context
    pub fn ctx(&self) -> &'a Context {
        self.ctx
    }

    /// Name of the task this scope belongs to
    pub fn task_name(&self) -> &'a str {
        self.task
    }

    /// Run a step and record it under the current one
    pub fn run(&mut self, step: &Step) -> ExecutionResult<()> {
        let body = Arc::clone(step.body());
        self.enter(step.name(), move |scope| body(scope))
    }

    /// Run an anonymous nested step
    pub fn step<F>(&mut self, body: F) -> ExecutionResult<()>
    where
        F: FnOnce(&mut Scope<'a>) -> ExecutionResult<()>,
    {
        self.enter(None, body)
    }

    /// Run a named nested step
    pub fn named<F>(&mut self, name: &str, body: F) -> ExecutionResult<()>
    where
        F: FnOnce(&mut Scope<'a>) -> ExecutionResult<()>,
    {
        self.enter(Some(name), body)
    }

    /// Record a warning against the task
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(task = %self.task, "{}", message);
        self.warnings.push(message);
    }

    pub(crate) fn set_prefix(&mut self, prefix: &'static str) {
        self.prefix = prefix;
    }

    pub(crate) fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub(crate) fn into_parts(self) -> (Vec<StepRecord>, Vec<String>) {
        (self.records, self.warnings)
    }

    fn enter<F>(&mut self, name: Option<&str>, body: F) -> ExecutionResult<()>
    where
        F: FnOnce(&mut Scope<'a>) -> ExecutionResult<()>,
    {
        let index = self.records.len();
        let label = match name {
            Some(name) => name.to_string(),
            None => format!("{}#{}", self.prefix, index + 1),
        };
        debug!(task = %self.task, step = %label, "step started");

        self.records.push(StepRecord {
            label,
            depth: self.depth,
            outcome: StepOutcome::Succeeded,
            duration: Duration::ZERO,
        });

        let started = Instant::now();
        self.depth += 1;
        let result = catch_unwind(AssertUnwindSafe(|| body(&mut *self)))
            .unwrap_or_else(|panic| Err(ExecutionError::fault(panic_message(panic))));
        self.depth -= 1;

        let record = &mut self.records[index];
        record.duration = started.elapsed();
        if result.is_err() {
            record.outcome = StepOutcome::Failed;
        }
        result
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("step panicked: {}", detail)
}
