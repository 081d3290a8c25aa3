//! Main CLI application

use crate::config::{check_param_value, parse_config_auto, parse_config_file, Config, Param};
use crate::error::{BuildError, ConfigError, ConfigResult};
use crate::logging::init_logging;
use crate::runner::{write_run_log, FailurePolicy, Orchestrator, RunRecord, Summary, Verbosity};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

/// Build the clap command
pub fn build_cli() -> Command {
    Command::new("buildrun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run build tasks in dependency order")
        .arg(
            Arg::new("tasks")
                .value_name("TASK")
                .help("Tasks to run; the configured default task when omitted")
                .num_args(0..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Path to buildrun.yml"),
        )
        .arg(
            Arg::new("param")
                .short('p')
                .long("param")
                .value_name("KEY=VALUE")
                .help("Run parameter forwarded into the build state")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("fail-fast")
                .long("fail-fast")
                .help("Abort the whole run on the first failure")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .value_parser(value_parser!(u16).range(1..))
                .help("Run independent tasks on N worker threads"),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List tasks and parameters")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Write the run transcript to PATH"),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(value_parser!(Shell))
                .help("Print shell completions"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Turn `-p` values into run parameters
///
/// `KEY=VALUE` sets a value, a bare `KEY` means "true". Declared parameters
/// fall back to their environment variable, then their default, and are
/// type-checked. Undeclared parameters are forwarded as given.
pub fn resolve_params(
    declared: &HashMap<String, Param>,
    raw: &[String],
) -> ConfigResult<HashMap<String, String>> {
    let mut params = HashMap::new();

    for item in raw {
        let (key, value) = item.split_once('=').unwrap_or((item.as_str(), "true"));
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "parameter '{}' has no name",
                item
            )));
        }
        params.insert(key.to_string(), value.to_string());
    }

    for (name, param) in declared {
        if !params.contains_key(name) {
            let fallback = param
                .environment
                .as_ref()
                .and_then(|var| std::env::var(var).ok())
                .or_else(|| param.default.clone());
            match fallback {
                Some(value) => {
                    params.insert(name.clone(), value);
                }
                None if param.required => return Err(ConfigError::MissingParam(name.clone())),
                None => {}
            }
        }

        if let Some(value) = params.get(name) {
            check_param_value(name, &param.param_type, value)?;
        }
    }

    Ok(params)
}

fn print_listing(config: &Config, orchestrator: &Orchestrator) {
    if let Some(usage) = &config.usage {
        println!("{}\n", usage);
    }

    println!("{}", "Tasks:".bold());
    let default = &orchestrator.settings().default_task;
    for task in orchestrator.tasks().into_iter().filter(|t| !t.private) {
        let marker = if &task.name == default { " (default)" } else { "" };
        println!(
            "  {:<20} {}{}",
            task.name.green(),
            task.synopsis.as_deref().unwrap_or(""),
            marker.dimmed()
        );
    }

    if !config.params.is_empty() {
        println!("\n{}", "Parameters:".bold());
        let mut names: Vec<&String> = config.params.keys().collect();
        names.sort();
        for name in names {
            let param = &config.params[name];
            println!(
                "  {:<20} {} [{}]",
                name.cyan(),
                param.usage.as_deref().unwrap_or(""),
                param.param_type
            );
        }
    }
}

fn print_summary(summary: &Summary, verbosity: Verbosity) {
    if verbosity == Verbosity::Silent {
        return;
    }

    for warning in &summary.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
    for fault in &summary.errors {
        eprintln!("{} {}", "error:".red().bold(), fault);
    }

    let line = format!("{}: {}", summary.target, summary);
    if summary.success {
        eprintln!("{}", line.green());
    } else {
        eprintln!("{}", line.red().bold());
    }
}

/// Run the CLI with already parsed arguments, returning the exit code
pub fn execute(matches: &ArgMatches) -> Result<i32, BuildError> {
    if let Some(shell) = matches.get_one::<Shell>("completions") {
        generate(*shell, &mut build_cli(), "buildrun", &mut io::stdout());
        return Ok(0);
    }

    let verbosity = get_verbosity(matches);
    if let Err(e) = init_logging(verbosity) {
        eprintln!("{} {}", "warning:".yellow().bold(), e);
    }

    let (config, config_path) = match matches.get_one::<PathBuf>("file") {
        Some(path) => (parse_config_file(path)?, path.clone()),
        None => parse_config_auto()?,
    };

    let mut orchestrator = Orchestrator::from_config(&config, &config_path)?;
    {
        let settings = orchestrator.settings_mut();
        settings.verbosity = verbosity;
        if matches.get_flag("fail-fast") {
            settings.policy = FailurePolicy::FailFast;
        }
        if let Some(jobs) = matches.get_one::<u16>("jobs") {
            settings.jobs = usize::from(*jobs);
        }
    }

    if matches.get_flag("list") {
        print_listing(&config, &orchestrator);
        return Ok(0);
    }

    let raw: Vec<String> = matches
        .get_many::<String>("param")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let params = resolve_params(&config.params, &raw)?;

    let targets: Vec<Option<&str>> = match matches.get_many::<String>("tasks") {
        Some(names) => names.map(|n| Some(n.as_str())).collect(),
        None => vec![None],
    };

    let mut code = 0;
    let mut runs: Vec<RunRecord> = Vec::new();
    for target in targets {
        match orchestrator.run(target, params.clone()) {
            Ok(summary) => {
                print_summary(&summary, verbosity);
                code = code.max(summary.exit_code());
                runs.extend(orchestrator.last_run().cloned());
            }
            Err(e) => {
                if verbosity != Verbosity::Silent {
                    eprintln!("{} {}", "error:".red().bold(), e);
                }
                code = 1;
            }
        }
    }

    if let Some(path) = matches.get_one::<PathBuf>("log-file") {
        write_run_log(&runs, path)?;
    }

    Ok(code)
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<i32, BuildError> {
    execute(&build_cli().get_matches())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(args: &[&str]) -> ArgMatches {
        build_cli().try_get_matches_from(args).unwrap()
    }

    fn raw(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_verbosity() {
        assert_eq!(get_verbosity(&matches(&["buildrun"])), Verbosity::Normal);
        assert_eq!(get_verbosity(&matches(&["buildrun", "-q"])), Verbosity::Quiet);
        assert_eq!(get_verbosity(&matches(&["buildrun", "-s", "-v"])), Verbosity::Silent);
    }

    #[test]
    fn test_cli_targets_and_params() {
        let m = matches(&["buildrun", "-p", "A=1", "build", "test", "--param", "B"]);
        let tasks: Vec<&String> = m.get_many::<String>("tasks").unwrap().collect();
        assert_eq!(tasks, vec!["build", "test"]);
        let params: Vec<&String> = m.get_many::<String>("param").unwrap().collect();
        assert_eq!(params, vec!["A=1", "B"]);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(build_cli()
            .try_get_matches_from(["buildrun", "-j", "0"])
            .is_err());
    }

    #[test]
    fn test_resolve_params_forwards_undeclared() {
        let params = resolve_params(&HashMap::new(), &raw(&["Version=1.2=3", "NoTestDiff"])).unwrap();
        assert_eq!(params["Version"], "1.2=3");
        assert_eq!(params["NoTestDiff"], "true");
    }

    #[test]
    fn test_resolve_params_defaults_and_types() {
        let mut declared = HashMap::new();
        declared.insert(
            "Retries".to_string(),
            Param {
                param_type: "int".to_string(),
                default: Some("2".to_string()),
                ..Default::default()
            },
        );

        let params = resolve_params(&declared, &[]).unwrap();
        assert_eq!(params["Retries"], "2");

        let err = resolve_params(&declared, &raw(&["Retries=lots"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParamValue { .. }));
    }

    #[test]
    fn test_resolve_params_required() {
        let mut declared = HashMap::new();
        declared.insert(
            "Channel".to_string(),
            Param {
                required: true,
                environment: Some("BUILDRUN_TEST_UNSET_CHANNEL".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(
            resolve_params(&declared, &[]),
            Err(ConfigError::MissingParam(name)) if name == "Channel"
        ));
        assert!(resolve_params(&declared, &raw(&["Channel=beta"])).is_ok());
    }

    #[test]
    fn test_resolve_params_empty_name() {
        assert!(resolve_params(&HashMap::new(), &raw(&["=x"])).is_err());
    }
}
