//! Task graph orchestrator
//!
//! Owns the task registry and the record of the last run. A run resolves the
//! target's dependency closure into an order, then processes each task once:
//! dependency gates first, then the guard, then the action.

use crate::config::{self, Config};
use crate::error::{ExecutionError, OrchestratorError, OrchestratorResult, Result};
use crate::runner::incremental::is_up_to_date;
use crate::runner::parallel;
use crate::runner::plan::resolve_order;
use crate::runner::record::{
    AbortReason, RunRecord, SkipReason, Summary, TaskFault, TaskOutcome, TaskRecord, TaskStatus,
    TaskWarning,
};
use crate::runner::{Context, Scope, Task, Verbosity};
use chrono::Utc;
use std::collections::HashMap;
use std::env;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// Task name used when a run names no target
pub const DEFAULT_TASK: &str = "default";

/// What a task failure does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the failed task's dependents, keep running unrelated branches
    #[default]
    ContinueUnrelated,
    /// Stop scheduling anything once a task fails
    FailFast,
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_task: String,
    pub policy: FailurePolicy,
    /// Re-registering a name replaces the earlier task
    pub allow_overwrite: bool,
    /// Worker threads; 1 runs everything on the calling thread
    pub jobs: usize,
    pub working_dir: PathBuf,
    pub interpreter: Vec<String>,
    /// Initial build state
    pub vars: HashMap<String, String>,
    pub verbosity: Verbosity,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_task: DEFAULT_TASK.to_string(),
            policy: FailurePolicy::default(),
            allow_overwrite: true,
            jobs: 1,
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            vars: HashMap::new(),
            verbosity: Verbosity::Normal,
        }
    }
}

/// Registers tasks and runs them in dependency order
#[derive(Debug, Default)]
pub struct Orchestrator {
    tasks: HashMap<String, Task>,
    settings: Settings,
    last_run: Option<RunRecord>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Orchestrator {
            tasks: HashMap::new(),
            settings,
            last_run: None,
        }
    }

    /// Build an orchestrator from a parsed build file
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self> {
        let working_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut vars = config.vars.clone();
        if let Some(env_file) = &config.env_file {
            vars.extend(config::load_env_file(&working_dir.join(env_file))?);
        }

        let settings = Settings {
            default_task: config
                .default
                .clone()
                .unwrap_or_else(|| DEFAULT_TASK.to_string()),
            policy: if config.settings.fail_fast {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::ContinueUnrelated
            },
            allow_overwrite: config.settings.allow_overwrite,
            jobs: config.settings.jobs.max(1),
            interpreter: config
                .interpreter
                .clone()
                .unwrap_or_else(|| Settings::default().interpreter),
            working_dir,
            vars,
            verbosity: Verbosity::Normal,
        };

        let mut orchestrator = Orchestrator::with_settings(settings);

        let mut names: Vec<&String> = config.tasks.keys().collect();
        names.sort();
        for name in names {
            let task = Task::from_config(name.clone(), config.tasks[name].clone())?;
            orchestrator.register(task)?;
        }

        Ok(orchestrator)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Add a task, replacing any earlier one of the same name unless disallowed
    pub fn register(&mut self, task: Task) -> OrchestratorResult<()> {
        if self.tasks.contains_key(&task.name) {
            if !self.settings.allow_overwrite {
                return Err(OrchestratorError::DuplicateTask(task.name));
            }
            debug!(task = %task.name, "replacing task definition");
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// All registered tasks, sorted by name
    pub fn tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        tasks
    }

    /// Resolve the execution order for a target without running anything
    pub fn plan(&self, target: Option<&str>) -> OrchestratorResult<Vec<String>> {
        let target = target.unwrap_or(self.settings.default_task.as_str());
        resolve_order(&self.tasks, target)
    }

    /// Run a target (or the default task) with the given parameters
    pub fn run(
        &mut self,
        target: Option<&str>,
        params: HashMap<String, String>,
    ) -> OrchestratorResult<Summary> {
        self.last_run = None;

        let target = target.unwrap_or(self.settings.default_task.as_str()).to_string();
        let order = resolve_order(&self.tasks, &target)?;
        debug!(target = %target, order = ?order, "resolved execution order");

        let ctx = self.new_context(params);
        let mut run = RunRecord::start(&target);
        info!(target = %target, tasks = order.len(), "run started");

        if self.settings.jobs > 1 {
            parallel::execute(
                &self.tasks,
                &order,
                &ctx,
                self.settings.policy,
                self.settings.jobs,
                &mut run,
            );
        } else {
            execute_sequential(&self.tasks, &order, &ctx, self.settings.policy, &mut run);
        }

        run.finish();
        let summary = run.summary();
        if summary.success {
            info!(target = %target, "{}", summary);
        } else {
            error!(target = %target, "{}", summary);
        }

        self.last_run = Some(run);
        Ok(summary)
    }

    /// Summary of the last completed run
    pub fn summary(&self) -> OrchestratorResult<Summary> {
        self.last_run
            .as_ref()
            .filter(|run| run.is_complete())
            .map(RunRecord::summary)
            .ok_or(OrchestratorError::RunNotComplete)
    }

    /// Full record of the last completed run
    pub fn last_run(&self) -> Option<&RunRecord> {
        self.last_run.as_ref()
    }

    fn new_context(&self, params: HashMap<String, String>) -> Context {
        Context::new()
            .with_working_dir(self.settings.working_dir.clone())
            .with_interpreter(self.settings.interpreter.clone())
            .with_verbosity(self.settings.verbosity)
            .with_vars(self.settings.vars.clone())
            .with_params(params)
    }
}

/// Decision taken for a task once its dependencies are settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Gate {
    Run,
    Skip(SkipReason),
    Abort(AbortReason),
}

pub(crate) fn gate(task: &Task, statuses: &HashMap<String, TaskStatus>, halted: bool) -> Gate {
    if halted {
        return Gate::Abort(AbortReason::FailFast);
    }

    for dep in &task.depends {
        match statuses.get(&dep.name) {
            Some(status) if status.is_failure() => {
                return Gate::Abort(AbortReason::DependencyFailed(dep.name.clone()));
            }
            Some(status) if dep.require_success && status.is_skipped() => {
                return Gate::Skip(SkipReason::DependencyNotSucceeded(dep.name.clone()));
            }
            _ => {}
        }
    }

    Gate::Run
}

/// Outcome for a task settled without running it
pub(crate) fn settle(task: &Task, gate: Gate) -> TaskOutcome {
    let status = match gate {
        Gate::Skip(reason) => TaskStatus::Skipped(reason),
        Gate::Abort(reason) => TaskStatus::Aborted(reason),
        Gate::Run => TaskStatus::Pending,
    };
    debug!(task = %task.name, status = %status, "task not started");
    TaskOutcome::resolved(&task.name, status)
}

/// Evaluate the guard and run the action of one task
pub(crate) fn execute_task(task: &Task, ctx: &Context) -> TaskOutcome {
    let started_at = Utc::now();
    let clock = Instant::now();
    let mut faults = Vec::new();
    let mut warnings = Vec::new();
    let mut steps = Vec::new();

    let status = match admit(task, ctx) {
        Ok(Some(reason)) => {
            debug!(task = %task.name, "task skipped");
            TaskStatus::Skipped(reason)
        }
        Err(e) => {
            faults.push(TaskFault {
                task: task.name.clone(),
                step: None,
                error: e,
            });
            TaskStatus::Failed
        }
        Ok(None) => {
            info!(task = %task.name, "task started");
            let mut scope = Scope::new(ctx, &task.name);

            let mut result = run_steps(&mut scope, &task.steps);
            if let Err(e) = &result {
                faults.push(fault(task, &scope, e.clone()));
            }

            if !task.finally.is_empty() {
                scope.set_prefix("finally");
                let finally = run_steps(&mut scope, &task.finally);
                if let Err(e) = finally {
                    faults.push(fault(task, &scope, e.clone()));
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }

            let (records, messages) = scope.into_parts();
            steps = records;
            warnings.extend(messages.into_iter().map(|message| TaskWarning {
                task: task.name.clone(),
                message,
            }));

            match result {
                Ok(()) => TaskStatus::Succeeded,
                Err(_) => TaskStatus::Failed,
            }
        }
    };

    for f in &faults {
        error!(task = %task.name, "{}", f.error);
    }
    if status == TaskStatus::Succeeded {
        info!(task = %task.name, elapsed = ?clock.elapsed(), "task succeeded");
    }

    TaskOutcome {
        record: TaskRecord {
            name: task.name.clone(),
            status,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
            duration: Some(clock.elapsed()),
            steps,
        },
        faults,
        warnings,
    }
}

/// `Some(reason)` when the task should be skipped
fn admit(task: &Task, ctx: &Context) -> std::result::Result<Option<SkipReason>, ExecutionError> {
    if let Some(guard) = &task.guard {
        let verdict = catch_unwind(AssertUnwindSafe(|| guard(ctx)))
            .unwrap_or_else(|_| Err(ExecutionError::fault("guard panicked")));
        if !verdict? {
            return Ok(Some(SkipReason::GuardFalse));
        }
    }
    if !task.source.is_empty() && is_up_to_date(&task.source, &task.target, ctx)? {
        return Ok(Some(SkipReason::UpToDate));
    }
    Ok(None)
}

fn run_steps(scope: &mut Scope<'_>, steps: &[crate::runner::Step]) -> crate::error::ExecutionResult<()> {
    for step in steps {
        scope.run(step)?;
    }
    Ok(())
}

fn fault(task: &Task, scope: &Scope<'_>, error: ExecutionError) -> TaskFault {
    let step = scope
        .records()
        .iter()
        .rev()
        .find(|r| r.outcome == crate::runner::StepOutcome::Failed)
        .map(|r| r.label.clone());
    TaskFault {
        task: task.name.clone(),
        step,
        error,
    }
}

fn execute_sequential(
    tasks: &HashMap<String, Task>,
    order: &[String],
    ctx: &Context,
    policy: FailurePolicy,
    run: &mut RunRecord,
) {
    let mut statuses: HashMap<String, TaskStatus> = HashMap::new();
    let mut halted = false;

    for name in order {
        let Some(task) = tasks.get(name) else {
            continue;
        };

        let outcome = match gate(task, &statuses, halted) {
            Gate::Run => execute_task(task, ctx),
            other => settle(task, other),
        };

        if outcome.record.status == TaskStatus::Failed && policy == FailurePolicy::FailFast {
            halted = true;
        }
        statuses.insert(name.clone(), outcome.record.status.clone());
        run.append(outcome);
    }
}
