//! Task definitions
//!
//! A [`Task`] is what gets registered with the orchestrator: a name, its
//! dependencies, an optional guard, and the steps of its action. Tasks come
//! either from Rust code (builder methods) or from the build file
//! ([`Task::from_config`]).

use crate::config;
use crate::error::{ConfigError, ConfigResult, ExecutionError, ExecutionResult};
use crate::runner::{
    assert, capture_command, evaluate_when_list, execute_command, Assertion, Context, Scope,
    ShellCommand, Step, When,
};
use std::fmt;
use std::sync::Arc;

/// Guard predicate evaluated right before a task would run
pub type Guard = Arc<dyn Fn(&Context) -> ExecutionResult<bool> + Send + Sync>;

/// Edge to another task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// A skipped dependency also skips the dependent
    pub require_success: bool,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Dependency {
            name: name.into(),
            require_success: false,
        }
    }

    pub fn requiring_success(name: impl Into<String>) -> Self {
        Dependency {
            name: name.into(),
            require_success: true,
        }
    }

    pub fn from_config(config: config::DependencySpec) -> Self {
        match config {
            config::DependencySpec::Simple(name) => Dependency::new(name),
            config::DependencySpec::Detailed(detail) => Dependency {
                name: detail.task,
                require_success: detail.require_success,
            },
        }
    }
}

impl From<&str> for Dependency {
    fn from(name: &str) -> Self {
        Dependency::new(name)
    }
}

impl From<String> for Dependency {
    fn from(name: String) -> Self {
        Dependency::new(name)
    }
}

/// A named unit of build work
#[derive(Clone)]
pub struct Task {
    pub name: String,

    /// One-line usage for listings
    pub synopsis: Option<String>,

    /// Longer description
    pub description: Option<String>,

    /// Hidden from listings
    pub private: bool,

    pub depends: Vec<Dependency>,

    pub guard: Option<Guard>,

    /// The action, in order
    pub steps: Vec<Step>,

    /// Always executed after the action, even when it failed
    pub finally: Vec<Step>,

    /// Input globs for incremental runs
    pub source: Vec<String>,

    /// Output globs for incremental runs
    pub target: Vec<String>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            synopsis: None,
            description: None,
            private: false,
            depends: Vec::new(),
            guard: None,
            steps: Vec::new(),
            finally: Vec::new(),
            source: Vec::new(),
            target: Vec::new(),
        }
    }

    pub fn synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.synopsis = Some(synopsis.into());
        self
    }

    pub fn depends_on<I, D>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Dependency>,
    {
        self.depends.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Depend on a task that must actually succeed, not merely be skipped
    pub fn requires(mut self, name: impl Into<String>) -> Self {
        self.depends.push(Dependency::requiring_success(name));
        self
    }

    /// Fallible guard
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Context) -> ExecutionResult<bool> + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Infallible guard
    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.guard(move |ctx| Ok(predicate(ctx)))
    }

    /// Append an anonymous step to the action
    pub fn action<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> ExecutionResult<()> + Send + Sync + 'static,
    {
        self.steps.push(Step::anonymous(body));
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn finally<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> ExecutionResult<()> + Send + Sync + 'static,
    {
        self.finally.push(Step::anonymous(body));
        self
    }

    /// Skip the task while every target is newer than every source
    pub fn incremental<S, T>(mut self, source: S, target: T) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        self.source = source.into_iter().map(Into::into).collect();
        self.target = target.into_iter().map(Into::into).collect();
        self
    }

    /// Names of the tasks this one depends on
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.depends.iter().map(|d| d.name.as_str())
    }

    /// Create a task from its build file definition
    pub fn from_config(name: String, config: config::Task) -> ConfigResult<Self> {
        Self::validate_config(&name, &config)?;

        let guard: Option<Guard> = if config.when.is_empty() {
            None
        } else {
            let when: Vec<When> = config.when.into_iter().map(When::from_config).collect();
            Some(Arc::new(move |ctx: &Context| evaluate_when_list(&when, ctx)))
        };

        let to_steps = |items: Vec<config::Run>| -> ConfigResult<Vec<Step>> {
            items
                .into_iter()
                .map(|item| RunItem::from_config(&name, item).map(RunItem::into_step))
                .collect()
        };

        Ok(Task {
            synopsis: config.usage,
            description: config.description,
            private: config.private,
            depends: config
                .depends
                .into_iter()
                .map(Dependency::from_config)
                .collect(),
            guard,
            steps: to_steps(config.run)?,
            finally: to_steps(config.finally)?,
            source: config.source,
            target: config.target,
            name,
        })
    }

    /// Validate task configuration
    fn validate_config(name: &str, config: &config::Task) -> ConfigResult<()> {
        if !config.source.is_empty() && config.target.is_empty() {
            return Err(ConfigError::SourceWithoutTarget(name.to_string()));
        }
        if !config.target.is_empty() && config.source.is_empty() {
            return Err(ConfigError::TargetWithoutSource(name.to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("depends", &self.depends)
            .field("guard", &self.guard.is_some())
            .field("steps", &self.steps)
            .field("finally", &self.finally)
            .finish()
    }
}

/// Runtime representation of a build file run item
#[derive(Debug, Clone)]
pub struct RunItem {
    pub name: Option<String>,
    pub when: Vec<When>,
    pub commands: Vec<ShellCommand>,
    pub capture: Option<(String, String)>,
    pub set: Vec<(String, Option<String>)>,
    pub assert: Vec<Assertion>,
    pub warn: Option<String>,
}

impl RunItem {
    pub fn from_config(task: &str, config: config::Run) -> ConfigResult<Self> {
        match config {
            config::Run::SimpleCommand(cmd) => Ok(RunItem {
                name: None,
                when: Vec::new(),
                commands: vec![ShellCommand::Simple(cmd)],
                capture: None,
                set: Vec::new(),
                assert: Vec::new(),
                warn: None,
            }),
            config::Run::Complex(item) => {
                let assert = item
                    .assert
                    .into_iter()
                    .map(|a| {
                        Assertion::from_config(a).ok_or_else(|| {
                            ConfigError::Invalid(format!("task '{}': empty assertion", task))
                        })
                    })
                    .collect::<ConfigResult<Vec<_>>>()?;

                Ok(RunItem {
                    name: item.name,
                    when: item.when.into_iter().map(When::from_config).collect(),
                    commands: item
                        .command
                        .into_iter()
                        .map(ShellCommand::from_config)
                        .collect(),
                    capture: item.capture.map(|c| (c.var, c.exec)),
                    set: item.set.into_iter().collect(),
                    assert,
                    warn: item.warn,
                })
            }
        }
    }

    /// Execute the item: condition, commands, capture, set, assertions, warning
    pub fn execute(&self, scope: &mut Scope<'_>) -> ExecutionResult<()> {
        let ctx = scope.ctx();

        if !self.when.is_empty() && !evaluate_when_list(&self.when, ctx)? {
            return Ok(());
        }

        for cmd in &self.commands {
            execute_command(cmd, ctx)?;
        }

        if let Some((var, exec)) = &self.capture {
            let value = capture_command(exec, ctx)?;
            ctx.set_var(var.clone(), value);
        }

        for (key, value) in &self.set {
            match value {
                Some(value) => {
                    let value = ctx.interpolate(value)?;
                    ctx.set_var(key.clone(), value);
                }
                None => {
                    ctx.state.remove(key);
                }
            }
        }

        for check in &self.assert {
            assert::check(check, ctx)?;
        }

        if let Some(message) = &self.warn {
            let message = ctx
                .interpolate(message)
                .map_err(ExecutionError::from)?;
            scope.warn(message);
        }

        Ok(())
    }

    pub fn into_step(self) -> Step {
        match self.name.clone() {
            Some(name) => Step::named(name, move |scope| self.execute(scope)),
            None => Step::anonymous(move |scope| self.execute(scope)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn empty_config() -> config::Task {
        config::Task {
            usage: None,
            description: None,
            private: false,
            depends: vec![],
            when: vec![],
            run: vec![],
            finally: vec![],
            source: vec![],
            target: vec![],
            include: None,
        }
    }

    #[test]
    fn test_task_validation_source_without_target() {
        let mut config = empty_config();
        config.source = vec!["src.txt".to_string()];

        let result = Task::from_config("pack".to_string(), config);
        assert!(matches!(result, Err(ConfigError::SourceWithoutTarget(_))));
    }

    #[test]
    fn test_from_config_dependencies() {
        let mut config = empty_config();
        config.depends = vec![
            config::DependencySpec::Simple("version".to_string()),
            config::DependencySpec::Detailed(config::DependencyDetail {
                task: "help".to_string(),
                require_success: true,
            }),
        ];

        let task = Task::from_config("package".to_string(), config).unwrap();
        assert_eq!(
            task.depends,
            vec![Dependency::new("version"), Dependency::requiring_success("help")]
        );
        assert!(task.guard.is_none());
    }

    #[test]
    fn test_from_config_guard() {
        let mut config = empty_config();
        config.when = vec![config::When {
            var_set: Some("publish".to_string()),
            ..Default::default()
        }];

        let task = Task::from_config("push".to_string(), config).unwrap();
        let guard = task.guard.clone().unwrap();

        let ctx = Context::new();
        assert!(!guard(&ctx).unwrap());
        ctx.set_var("publish", "1");
        assert!(guard(&ctx).unwrap());
    }

    #[test]
    fn test_run_item_sets_and_removes_state() {
        let mut set = BTreeMap::new();
        set.insert("version".to_string(), Some("v${base}".to_string()));
        set.insert("stale".to_string(), None);
        let item = RunItem::from_config(
            "t",
            config::Run::Complex(config::RunItem {
                set,
                ..Default::default()
            }),
        )
        .unwrap();

        let ctx = Context::new();
        ctx.set_var("base", "1.0");
        ctx.set_var("stale", "x");
        let mut scope = Scope::new(&ctx, "t");
        scope.run(&item.into_step()).unwrap();

        assert_eq!(ctx.get_var("version"), Some("v1.0".to_string()));
        assert_eq!(ctx.get_var("stale"), None);
    }

    #[test]
    fn test_named_run_item_becomes_named_step() {
        let item = RunItem::from_config(
            "t",
            config::Run::Complex(config::RunItem {
                name: Some("manifest".to_string()),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(item.into_step().name(), Some("manifest"));
    }

    #[test]
    fn test_empty_assertion_rejected() {
        let result = RunItem::from_config(
            "t",
            config::Run::Complex(config::RunItem {
                assert: vec![config::Assert::default()],
                ..Default::default()
            }),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
