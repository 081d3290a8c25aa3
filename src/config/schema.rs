//! Configuration validation
//!
//! Structural checks run before any task is registered. Dependency cycles are
//! left to the orchestrator, which reports them per target.

use crate::config::types::{Config, Param, Task};
use crate::error::{ConfigError, ConfigResult};

/// Parameter types accepted in `params`
pub const PARAM_TYPES: &[&str] = &["string", "bool", "boolean", "int", "integer", "float"];

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    if config.settings.jobs == 0 {
        return Err(ConfigError::Invalid(
            "settings.jobs must be at least 1".to_string(),
        ));
    }

    if let Some(interpreter) = &config.interpreter {
        if interpreter.is_empty() {
            return Err(ConfigError::Invalid(
                "interpreter must name a program".to_string(),
            ));
        }
    }

    if let Some(default) = &config.default {
        if !config.tasks.contains_key(default) {
            return Err(ConfigError::Invalid(format!(
                "default task '{}' is not defined",
                default
            )));
        }
    }

    for (name, param) in &config.params {
        validate_param(name, param)?;
    }

    for (name, task) in &config.tasks {
        validate_task(name, task)?;
    }

    Ok(())
}

/// Validate a single task
pub fn validate_task(name: &str, task: &Task) -> ConfigResult<()> {
    if !task.source.is_empty() && task.target.is_empty() {
        return Err(ConfigError::SourceWithoutTarget(name.to_string()));
    }
    if !task.target.is_empty() && task.source.is_empty() {
        return Err(ConfigError::TargetWithoutSource(name.to_string()));
    }
    Ok(())
}

/// Validate a parameter declaration, including its default value
pub fn validate_param(name: &str, param: &Param) -> ConfigResult<()> {
    if !PARAM_TYPES.contains(&param.param_type.as_str()) {
        return Err(ConfigError::InvalidParamType {
            name: name.to_string(),
            kind: param.param_type.clone(),
        });
    }
    if let Some(default) = &param.default {
        check_param_value(name, &param.param_type, default)?;
    }
    Ok(())
}

/// Check that `value` parses as `kind`
pub fn check_param_value(name: &str, kind: &str, value: &str) -> ConfigResult<()> {
    let invalid = |error: String| ConfigError::InvalidParamValue {
        name: name.to_string(),
        error,
    };

    match kind {
        "bool" | "boolean" => match value.to_ascii_lowercase().as_str() {
            "true" | "false" | "1" | "0" | "yes" | "no" => Ok(()),
            _ => Err(invalid(format!("'{}' is not a boolean", value))),
        },
        "int" | "integer" => value
            .parse::<i64>()
            .map(|_| ())
            .map_err(|e| invalid(format!("'{}': {}", value, e))),
        "float" => value
            .parse::<f64>()
            .map(|_| ())
            .map_err(|e| invalid(format!("'{}': {}", value, e))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_task(name: &str, task: Task) -> Config {
        let mut config = Config::default();
        config.tasks.insert(name.to_string(), task);
        config
    }

    #[test]
    fn test_validate_source_without_target() {
        let config = config_with_task(
            "test",
            Task {
                source: vec!["src.txt".to_string()],
                ..Default::default()
            },
        );

        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::SourceWithoutTarget(name)) if name == "test"));
    }

    #[test]
    fn test_validate_target_without_source() {
        let config = config_with_task(
            "test",
            Task {
                target: vec!["out.txt".to_string()],
                ..Default::default()
            },
        );

        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::TargetWithoutSource(_))
        ));
    }

    #[test]
    fn test_validate_invalid_param_type() {
        let param = Param {
            param_type: "invalid_type".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            validate_param("p", &param),
            Err(ConfigError::InvalidParamType { .. })
        ));
    }

    #[test]
    fn test_validate_valid_param_types() {
        for kind in PARAM_TYPES {
            let param = Param {
                param_type: kind.to_string(),
                ..Default::default()
            };
            assert!(validate_param("p", &param).is_ok(), "Failed for type: {}", kind);
        }
    }

    #[test]
    fn test_param_default_must_match_type() {
        let param = Param {
            param_type: "int".to_string(),
            default: Some("many".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate_param("Retries", &param),
            Err(ConfigError::InvalidParamValue { .. })
        ));
    }

    #[test]
    fn test_check_param_values() {
        assert!(check_param_value("b", "bool", "Yes").is_ok());
        assert!(check_param_value("b", "bool", "maybe").is_err());
        assert!(check_param_value("f", "float", "1.5").is_ok());
        assert!(check_param_value("s", "string", "anything").is_ok());
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let mut config = Config::default();
        config.settings.jobs = 0;
        assert!(matches!(validate_config(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_default_task() {
        let mut config = config_with_task("build", Task::default());
        config.default = Some("ship".to_string());
        assert!(validate_config(&config).is_err());

        config.default = Some("build".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
