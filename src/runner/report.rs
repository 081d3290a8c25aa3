//! Run transcripts
//!
//! A completed run can be rendered as plain text and written to a log file.
//! Timestamps and durations vary between runs, so [`normalize_timestamps`]
//! rewrites them to fixed placeholders before a log is compared with a golden
//! sample.

use crate::runner::record::{RunRecord, TaskRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const TIMESTAMP_PLACEHOLDER: &str = "0000-00-00T00:00:00Z";
pub const DURATION_PLACEHOLDER: &str = "0.000s";

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?")
        .expect("valid timestamp pattern")
});

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\.\d{3}s\b").expect("valid duration pattern"));

/// Replace timestamps and durations with fixed placeholders
pub fn normalize_timestamps(text: &str) -> String {
    let text = TIMESTAMP.replace_all(text, TIMESTAMP_PLACEHOLDER);
    DURATION.replace_all(&text, DURATION_PLACEHOLDER).into_owned()
}

fn stamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

fn render_task(out: &mut String, task: &TaskRecord) {
    let _ = write!(out, "task {} {}", task.name, task.status);
    if let (Some(start), Some(end)) = (task.started_at, task.finished_at) {
        let _ = write!(out, " started {} finished {}", stamp(start), stamp(end));
    }
    if let Some(duration) = task.duration {
        let _ = write!(out, " in {}", seconds(duration));
    }
    out.push('\n');

    for step in &task.steps {
        let outcome = match step.outcome {
            crate::runner::StepOutcome::Succeeded => "succeeded",
            crate::runner::StepOutcome::Failed => "failed",
        };
        let _ = writeln!(
            out,
            "{}step {} {} in {}",
            "  ".repeat(step.depth + 1),
            step.label,
            outcome,
            seconds(step.duration)
        );
    }
}

/// Render a run as text, one line per task and step
pub fn render_run(run: &RunRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run {} started {}", run.target, stamp(run.started_at));

    for task in &run.tasks {
        render_task(&mut out, task);
    }
    for fault in &run.errors {
        let _ = writeln!(out, "error {}", fault);
    }
    for warning in &run.warnings {
        let _ = writeln!(out, "warning {}", warning);
    }

    let _ = writeln!(out, "summary {}", run.summary());
    let verdict = if run.success { "succeeded" } else { "failed" };
    match run.finished_at {
        Some(end) => {
            let _ = writeln!(
                out,
                "run {} {} finished {} in {}",
                run.target,
                verdict,
                stamp(end),
                seconds(run.elapsed())
            );
        }
        None => {
            let _ = writeln!(out, "run {} incomplete", run.target);
        }
    }
    out
}

/// Write one or more rendered runs to `path`
pub fn write_run_log<'a>(runs: impl IntoIterator<Item = &'a RunRecord>, path: &Path) -> io::Result<()> {
    let text: String = runs.into_iter().map(render_run).collect();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}
