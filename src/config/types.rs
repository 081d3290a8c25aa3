//! Core configuration types
//!
//! This module defines the data structures that represent a buildrun.yml file.

use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Project name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Project usage description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Task run when no target is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Global interpreter to use for commands (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// dotenv file loaded into the build state, relative to the build file
    #[serde(rename = "env-file", default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,

    #[serde(default)]
    pub settings: Settings,

    /// Initial build state
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    pub vars: HashMap<String, String>,

    /// Declared run parameters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, Param>,

    /// Tasks defined in the configuration
    #[serde(default)]
    pub tasks: HashMap<String, Task>,
}

/// Run-wide switches
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default = "default_true")]
    pub allow_overwrite: bool,

    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            fail_fast: false,
            allow_overwrite: true,
            jobs: 1,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_jobs() -> usize {
    1
}

/// A run parameter definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Param {
    /// Usage description for listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Parameter type (string, bool, int, float)
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,

    /// Default value
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_scalar"
    )]
    pub default: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Environment variable to read from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl Default for Param {
    fn default() -> Self {
        Param {
            usage: None,
            param_type: default_param_type(),
            default: None,
            required: false,
            environment: None,
        }
    }
}

fn default_param_type() -> String {
    "string".to_string()
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// Usage description for listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Longer description for listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this task is private (hidden from listings)
    #[serde(default)]
    pub private: bool,

    /// Tasks that must be processed first
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub depends: Vec<DependencySpec>,

    /// Guard conditions, all of which must hold
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub when: Vec<When>,

    /// Run items to execute
    #[serde(default, deserialize_with = "one_or_many")]
    pub run: Vec<Run>,

    /// Finally block - always executes, even on error
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub finally: Vec<Run>,

    /// Source files for incremental runs
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub source: Vec<String>,

    /// Target files for incremental runs
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub target: Vec<String>,

    /// Include another file as task definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

/// A dependency edge
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Plain task name
    Simple(String),

    Detailed(DependencyDetail),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DependencyDetail {
    pub task: String,

    /// Skip this task when the dependency was skipped
    #[serde(default)]
    pub require_success: bool,
}

/// A run item - either a plain command or a structured item
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Run {
    /// Simple string command
    SimpleCommand(String),

    /// Complex run item with conditionals and multiple actions
    Complex(RunItem),
}

/// A complex run item with conditions and actions
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunItem {
    /// Step name shown in the run report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Conditions that must be met for this run item to execute
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub when: Vec<When>,

    /// Commands to execute
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub command: Vec<Command>,

    /// Store a command's trimmed stdout in the build state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<Capture>,

    /// Build state entries to set; null removes the entry
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, Option<String>>,

    /// Checks that must hold afterwards
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub assert: Vec<Assert>,

    /// Warning recorded against the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn: Option<String>,
}

/// A command to execute
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Simple string command
    Simple(String),

    /// Complex command with additional options
    Complex(CommandDetail),
}

/// Detailed command specification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<String>,

    /// Whether to suppress output
    #[serde(default)]
    pub quiet: bool,

    /// Working directory for the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Capture {
    pub var: String,
    pub exec: String,
}

/// A conditional expression
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct When {
    /// Check if values are equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<WhenComparison>,

    /// Check if values are not equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equal: Option<WhenComparison>,

    /// Check if a command succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Check if a path exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<String>,

    /// Check if environment variable is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_set: Option<String>,

    /// Check if environment variable is not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_not_set: Option<String>,

    /// Check if a build state entry is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_set: Option<String>,

    /// Check if a build state entry is not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_not_set: Option<String>,
}

/// A comparison for when conditions and assertions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhenComparison {
    /// Left-hand side of comparison
    pub left: String,

    /// Right-hand side of comparison
    pub right: String,
}

/// An assertion; exactly one field is expected to be set
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Assert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_exists: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<FileCount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<WhenComparison>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_equal: Option<FilesEqual>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_set: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileCount {
    pub pattern: String,
    pub equals: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FilesEqual {
    pub left: String,
    pub right: String,

    /// Compare with timestamps and durations masked
    #[serde(default)]
    pub normalize_timestamps: bool,
}

/// Accept either a single value or a sequence of values
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| T::deserialize(item).map_err(D::Error::custom))
            .collect(),
        single => T::deserialize(single)
            .map(|item| vec![item])
            .map_err(D::Error::custom),
    }
}

fn scalar_to_string<E: Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(E::custom("expected a string, number, or boolean")),
    }
}

/// Accept numbers and booleans where a string is expected
fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_string(Value::deserialize(deserializer)?)
}

fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = Option::<HashMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();

    map.into_iter()
        .map(|(key, value)| {
            let value = scalar_to_string::<D::Error>(value)?.unwrap_or_default();
            Ok((key, value))
        })
        .collect()
}
