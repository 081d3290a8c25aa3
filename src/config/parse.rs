//! Build file parsing and discovery

use crate::config::schema::validate_config;
use crate::config::types::{Config, Task};
use crate::error::{BuildError, ConfigError, ConfigResult};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default build file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["buildrun.yml", "buildrun.yaml"];

/// Find the build file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the build file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            if config_path.is_file() {
                debug!(path = %config_path.display(), "found build file");
                return Ok(config_path);
            }
            searched_paths.push(config_path.display().to_string());
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse and validate a build file
pub fn parse_config_file(path: &Path) -> Result<Config, BuildError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("Failed to read '{}': {}", path.display(), e))
    })?;

    parse_config(&contents, Some(path))
}

/// Parse and validate build file contents
///
/// With a path, task `include` directives are resolved relative to it.
pub fn parse_config(yaml: &str, config_path: Option<&Path>) -> Result<Config, BuildError> {
    let mut config: Config = serde_yaml::from_str(yaml)?;

    if let Some(base_path) = config_path {
        process_includes(&mut config, base_path)?;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Replace tasks carrying an `include` with the task defined in that file
fn process_includes(config: &mut Config, config_path: &Path) -> ConfigResult<()> {
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    for (name, task) in config.tasks.iter_mut() {
        if let Some(include_path) = task.include.clone() {
            debug!(task = %name, include = %include_path, "including task definition");
            *task = load_included_task(&base_dir.join(include_path))?;
        }
    }

    Ok(())
}

/// Load a task from an included file
fn load_included_task(path: &Path) -> ConfigResult<Task> {
    let include_error = |error: String| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error,
    };

    let contents = fs::read_to_string(path).map_err(|e| include_error(e.to_string()))?;
    let task: Task = serde_yaml::from_str(&contents).map_err(|e| include_error(e.to_string()))?;

    if task.include.is_some() {
        return Err(include_error("included tasks cannot include further files".into()));
    }
    Ok(task)
}

/// Parse the build file found by searching upward from the current directory
pub fn parse_config_auto() -> Result<(Config, PathBuf), BuildError> {
    let config_path = find_config_file()?;
    let config = parse_config_file(&config_path)?;
    Ok((config, config_path))
}

/// Read KEY=VALUE pairs from a dotenv file
pub fn load_env_file(path: &Path) -> ConfigResult<HashMap<String, String>> {
    let env_error = |error: String| ConfigError::EnvFile {
        path: path.to_path_buf(),
        error,
    };

    let entries = dotenvy::from_path_iter(path).map_err(|e| env_error(e.to_string()))?;
    entries
        .map(|entry| entry.map_err(|e| env_error(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
tasks:
  hello:
    usage: Say hello
    run: echo "hello"
"#;
        let config = parse_config(yaml, None).unwrap();
        assert_eq!(config.tasks.len(), 1);
        assert!(config.tasks.contains_key("hello"));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("buildrun.yml");
        let sub_dir = temp_dir.path().join("subdir");

        fs::create_dir(&sub_dir).unwrap();
        fs::write(&config_path, "tasks: {}\n").unwrap();

        let found = find_config_file_from(sub_dir).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_yaml_extension_found() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("buildrun.yaml");
        fs::write(&config_path, "tasks: {}\n").unwrap();

        let found = find_config_file_from(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_config_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_config_file_from(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_include_replaces_task() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("tasks")).unwrap();
        fs::write(
            temp_dir.path().join("tasks/helper.yml"),
            "usage: Included helper\nrun: echo helper\n",
        )
        .unwrap();
        let config_path = temp_dir.path().join("buildrun.yml");
        fs::write(
            &config_path,
            "tasks:\n  helper:\n    include: tasks/helper.yml\n",
        )
        .unwrap();

        let config = parse_config_file(&config_path).unwrap();
        let helper = &config.tasks["helper"];
        assert_eq!(helper.usage.as_deref(), Some("Included helper"));
        assert_eq!(helper.run.len(), 1);
    }

    #[test]
    fn test_missing_include() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("buildrun.yml");
        fs::write(&config_path, "tasks:\n  helper:\n    include: nope.yml\n").unwrap();

        let result = parse_config_file(&config_path);
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::IncludeFile { .. }))
        ));
    }

    #[test]
    fn test_load_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "# release settings\nCHANNEL=beta\nQUOTED=\"a b\"\n").unwrap();

        let vars = load_env_file(&path).unwrap();
        assert_eq!(vars["CHANNEL"], "beta");
        assert_eq!(vars["QUOTED"], "a b");
    }

    #[test]
    fn test_missing_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_env_file(&temp_dir.path().join(".env"));
        assert!(matches!(result, Err(ConfigError::EnvFile { .. })));
    }
}
