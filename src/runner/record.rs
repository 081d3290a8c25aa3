//! Run bookkeeping
//!
//! Only the orchestrator writes these records. Actions see the context, never
//! the ledger.

use crate::error::ExecutionError;
use crate::runner::step::{StepOutcome, StepRecord};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Why a task was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The guard evaluated to false
    GuardFalse,
    /// A dependency declared as required was itself skipped
    DependencyNotSucceeded(String),
    /// Targets are newer than sources
    UpToDate,
}

/// Why a task never started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    DependencyFailed(String),
    FailFast,
}

/// Per-task state within one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped(SkipReason),
    Aborted(AbortReason),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// Failed, or prevented from starting by a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Aborted(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TaskStatus::Skipped(_))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped(SkipReason::GuardFalse) => write!(f, "skipped (guard false)"),
            TaskStatus::Skipped(SkipReason::DependencyNotSucceeded(dep)) => {
                write!(f, "skipped ('{}' did not succeed)", dep)
            }
            TaskStatus::Skipped(SkipReason::UpToDate) => write!(f, "skipped (up to date)"),
            TaskStatus::Aborted(AbortReason::DependencyFailed(dep)) => {
                write!(f, "aborted ('{}' failed)", dep)
            }
            TaskStatus::Aborted(AbortReason::FailFast) => write!(f, "aborted (fail-fast)"),
        }
    }
}

/// Ledger entry for one task
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub name: String,
    pub status: TaskStatus,
    /// Set once the task got as far as its guard
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub steps: Vec<StepRecord>,
}

impl TaskRecord {
    pub fn new(name: impl Into<String>, status: TaskStatus) -> Self {
        TaskRecord {
            name: name.into(),
            status,
            started_at: None,
            finished_at: None,
            duration: None,
            steps: Vec::new(),
        }
    }

    /// Label of the innermost step that failed
    pub fn failed_step(&self) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.outcome == StepOutcome::Failed)
            .map(|s| s.label.as_str())
    }
}

/// A fault captured at a task boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFault {
    pub task: String,
    pub step: Option<String>,
    pub error: ExecutionError,
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => write!(f, "{} [{}]: {}", self.task, step, self.error),
            None => write!(f, "{}: {}", self.task, self.error),
        }
    }
}

/// A warning emitted by a task action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWarning {
    pub task: String,
    pub message: String,
}

impl fmt::Display for TaskWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.message)
    }
}

/// Everything one task contributes to a run, appended in one go
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub record: TaskRecord,
    pub faults: Vec<TaskFault>,
    pub warnings: Vec<TaskWarning>,
}

impl TaskOutcome {
    pub fn resolved(name: &str, status: TaskStatus) -> Self {
        TaskOutcome {
            record: TaskRecord::new(name, status),
            faults: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// One execution of a target and its dependency closure
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub target: String,
    pub tasks: Vec<TaskRecord>,
    pub errors: Vec<TaskFault>,
    pub warnings: Vec<TaskWarning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,
}

impl RunRecord {
    pub fn start(target: impl Into<String>) -> Self {
        RunRecord {
            target: target.into(),
            tasks: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            success: true,
        }
    }

    pub(crate) fn append(&mut self, outcome: TaskOutcome) {
        if outcome.record.status.is_failure() {
            self.success = false;
        }
        self.tasks.push(outcome.record);
        self.errors.extend(outcome.faults);
        self.warnings.extend(outcome.warnings);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn status_of(&self, name: &str) -> Option<&TaskStatus> {
        self.tasks
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.status)
    }

    /// Names of tasks whose action ran, in the order they finished
    pub fn executed(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Succeeded | TaskStatus::Failed))
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> Summary {
        let names_where = |pred: fn(&TaskStatus) -> bool| -> Vec<String> {
            self.tasks
                .iter()
                .filter(|t| pred(&t.status))
                .map(|t| t.name.clone())
                .collect()
        };

        Summary {
            target: self.target.clone(),
            executed: self.executed().into_iter().map(String::from).collect(),
            succeeded: names_where(|s| *s == TaskStatus::Succeeded),
            skipped: names_where(TaskStatus::is_skipped),
            failed: names_where(|s| *s == TaskStatus::Failed),
            aborted: names_where(|s| matches!(s, TaskStatus::Aborted(_))),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
            success: self.success,
            elapsed: self.elapsed(),
        }
    }
}

/// Queryable result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub target: String,
    /// Tasks whose action ran, in order
    pub executed: Vec<String>,
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub aborted: Vec<String>,
    pub errors: Vec<TaskFault>,
    pub warnings: Vec<TaskWarning>,
    pub success: bool,
    pub elapsed: Duration,
}

impl Summary {
    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed, {} aborted",
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len(),
            self.aborted.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: TaskStatus) -> TaskOutcome {
        TaskOutcome::resolved(name, status)
    }

    #[test]
    fn test_append_tracks_failure() {
        let mut run = RunRecord::start("build");
        run.append(outcome("a", TaskStatus::Succeeded));
        assert!(run.success);

        let mut failed = outcome("b", TaskStatus::Failed);
        failed.faults.push(TaskFault {
            task: "b".to_string(),
            step: Some("#1".to_string()),
            error: ExecutionError::fault("boom"),
        });
        run.append(failed);
        run.append(outcome(
            "c",
            TaskStatus::Aborted(AbortReason::DependencyFailed("b".to_string())),
        ));
        run.finish();

        assert!(!run.success);
        assert_eq!(run.errors.len(), 1);
        assert_eq!(run.executed(), vec!["a", "b"]);
        assert_eq!(run.errors[0].to_string(), "b [#1]: boom");
    }

    #[test]
    fn test_summary_counts() {
        let mut run = RunRecord::start("default");
        run.append(outcome("a", TaskStatus::Succeeded));
        run.append(outcome("t", TaskStatus::Skipped(SkipReason::GuardFalse)));
        run.append(outcome("c", TaskStatus::Succeeded));
        run.finish();

        let summary = run.summary();
        assert_eq!(summary.executed_count(), 2);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.failed_count(), 0);
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(
            summary.to_string(),
            "2 succeeded, 1 skipped, 0 failed, 0 aborted"
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            TaskStatus::Skipped(SkipReason::UpToDate).to_string(),
            "skipped (up to date)"
        );
        assert_eq!(
            TaskStatus::Aborted(AbortReason::DependencyFailed("x".into())).to_string(),
            "aborted ('x' failed)"
        );
    }
}
