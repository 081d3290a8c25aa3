//! External process execution
//!
//! Every action that touches an external tool goes through [`run_external`]:
//! a non-zero exit becomes an [`ExecutionError::ExternalProcess`] fault.

use crate::config;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{Context, Verbosity};
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};
use tracing::{debug, info};

/// A program invocation with its arguments
#[derive(Debug, Clone, Default)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Capture stdout/stderr instead of inheriting them
    pub capture: bool,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ExternalCommand {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Human-readable command line
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a successful external invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalOutput {
    pub code: Option<i32>,
    /// Captured stdout (empty unless capturing)
    pub stdout: String,
    /// Captured stderr (empty unless capturing)
    pub stderr: String,
}

/// Run an external program, treating a non-zero exit as a fault
pub fn run_external(cmd: &ExternalCommand) -> ExecutionResult<ExternalOutput> {
    let mut command = StdCommand::new(&cmd.program);
    command.args(&cmd.args);

    if let Some(dir) = &cmd.dir {
        command.current_dir(dir);
    }
    for (key, value) in &cmd.env {
        command.env(key, value);
    }

    debug!(command = %cmd.display(), "spawning");

    let spawn_error = |e: std::io::Error| ExecutionError::Spawn {
        command: cmd.display(),
        error: e.to_string(),
    };

    let (status, stdout, stderr) = if cmd.capture {
        let output = command.stdin(Stdio::null()).output().map_err(spawn_error)?;
        (
            output.status,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )
    } else {
        let status = command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(spawn_error)?;
        (status, String::new(), String::new())
    };

    if !status.success() {
        return Err(ExecutionError::ExternalProcess {
            command: cmd.display(),
            code: status.code(),
        });
    }

    Ok(ExternalOutput {
        code: status.code(),
        stdout,
        stderr,
    })
}

/// A shell command line as written in the build file
#[derive(Debug, Clone)]
pub enum ShellCommand {
    /// Simple command string
    Simple(String),

    /// Command with display and directory options
    Complex {
        exec: String,
        print: String,
        quiet: bool,
        dir: Option<String>,
    },
}

impl ShellCommand {
    /// Create from config
    pub fn from_config(config: config::Command) -> Self {
        match config {
            config::Command::Simple(cmd) => ShellCommand::Simple(cmd),
            config::Command::Complex(detail) => ShellCommand::Complex {
                print: detail.print.clone().unwrap_or_else(|| detail.exec.clone()),
                exec: detail.exec,
                quiet: detail.quiet,
                dir: detail.dir,
            },
        }
    }

    /// Get the command to execute
    pub fn exec(&self) -> &str {
        match self {
            ShellCommand::Simple(cmd) => cmd,
            ShellCommand::Complex { exec, .. } => exec,
        }
    }

    /// Get what to print
    pub fn print(&self) -> &str {
        match self {
            ShellCommand::Simple(cmd) => cmd,
            ShellCommand::Complex { print, .. } => print,
        }
    }

    /// Check if this command is quiet
    pub fn is_quiet(&self) -> bool {
        match self {
            ShellCommand::Simple(_) => false,
            ShellCommand::Complex { quiet, .. } => *quiet,
        }
    }

    /// Get the working directory
    pub fn dir(&self) -> Option<&str> {
        match self {
            ShellCommand::Simple(_) => None,
            ShellCommand::Complex { dir, .. } => dir.as_deref(),
        }
    }
}

/// Wrap a shell line in the context interpreter, exporting build state
fn shell_invocation(line: &str, dir: PathBuf, ctx: &Context) -> ExternalCommand {
    let (program, interpreter_args) = match ctx.interpreter.split_first() {
        Some((program, rest)) => (program.clone(), rest.to_vec()),
        None => ("sh".to_string(), vec!["-c".to_string()]),
    };

    let mut cmd = ExternalCommand::new(program)
        .args(interpreter_args)
        .arg(line)
        .current_dir(dir);
    for (key, value) in ctx.state.snapshot() {
        cmd = cmd.env(key, value);
    }
    cmd
}

/// Whether a command line is echoed before it runs
fn echoes(cmd: &ShellCommand, ctx: &Context) -> bool {
    !cmd.is_quiet() && ctx.verbosity >= Verbosity::Normal
}

/// Execute a shell command in the given context
pub fn execute_command(cmd: &ShellCommand, ctx: &Context) -> ExecutionResult<()> {
    let exec_str = ctx.interpolate(cmd.exec())?;

    if echoes(cmd, ctx) {
        info!("[RUN] {}", ctx.interpolate(cmd.print())?);
    }

    let working_dir = match cmd.dir() {
        Some(dir) => ctx.resolve_path(&ctx.interpolate(dir)?),
        None => ctx.working_dir.clone(),
    };

    run_external(&shell_invocation(&exec_str, working_dir, ctx)).map_err(|e| match e {
        // Report the line as written rather than the interpreter invocation
        ExecutionError::ExternalProcess { code, .. } => ExecutionError::ExternalProcess {
            command: exec_str.clone(),
            code,
        },
        other => other,
    })?;

    Ok(())
}

/// Check if a command succeeds (for guards)
pub fn check_command(cmd_str: &str, ctx: &Context) -> ExecutionResult<bool> {
    let exec_str = ctx.interpolate(cmd_str)?;
    let cmd = shell_invocation(&exec_str, ctx.working_dir.clone(), ctx).capture();

    match run_external(&cmd) {
        Ok(_) => Ok(true),
        Err(ExecutionError::ExternalProcess { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Run a command and return its trimmed stdout
pub fn capture_command(cmd_str: &str, ctx: &Context) -> ExecutionResult<String> {
    let exec_str = ctx.interpolate(cmd_str)?;
    let cmd = shell_invocation(&exec_str, ctx.working_dir.clone(), ctx).capture();

    let output = run_external(&cmd).map_err(|e| match e {
        ExecutionError::ExternalProcess { code, .. } => ExecutionError::ExternalProcess {
            command: exec_str.clone(),
            code,
        },
        other => other,
    })?;

    Ok(output.stdout.trim().to_string())
}
