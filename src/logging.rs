//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `-s`, `-q` or `-v` on the command line
//! 2. `BUILDRUN_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`

use crate::runner::Verbosity;
use anyhow::{anyhow, Result};
use tracing_subscriber::fmt;

/// Environment variable consulted when no verbosity flag is given
pub const LOG_ENV: &str = "BUILDRUN_LOG";

/// Initialise the global logging subscriber, writing to stderr.
///
/// Silent verbosity installs nothing, so every event is dropped.
pub fn init_logging(verbosity: Verbosity) -> Result<()> {
    let Some(level) = level_for(verbosity, std::env::var(LOG_ENV).ok().as_deref()) else {
        return Ok(());
    };

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

fn level_for(verbosity: Verbosity, env_level: Option<&str>) -> Option<tracing::Level> {
    match verbosity {
        Verbosity::Silent => None,
        Verbosity::Quiet => Some(tracing::Level::WARN),
        Verbosity::Verbose => Some(tracing::Level::DEBUG),
        Verbosity::Normal => Some(
            env_level
                .and_then(parse_level_str)
                .unwrap_or(tracing::Level::INFO),
        ),
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_flags_override_environment() {
        assert_eq!(level_for(Verbosity::Silent, Some("trace")), None);
        assert_eq!(level_for(Verbosity::Quiet, Some("trace")), Some(Level::WARN));
        assert_eq!(level_for(Verbosity::Verbose, None), Some(Level::DEBUG));
    }

    #[test]
    fn test_environment_level() {
        assert_eq!(level_for(Verbosity::Normal, Some("Debug")), Some(Level::DEBUG));
        assert_eq!(level_for(Verbosity::Normal, Some("bogus")), Some(Level::INFO));
        assert_eq!(level_for(Verbosity::Normal, None), Some(Level::INFO));
    }
}
