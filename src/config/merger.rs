use crate::app::SupervisorArgs;
use crate::prelude::*;
use crate::session::{CommandLine, DEFAULT_PROFILE_ENV, SessionPlan};
use std::path::PathBuf;
use std::time::Duration;

use super::ProjectConfig;

/// Everything the supervisor needs once the CLI and the config file have been reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Name of the environment variable requesting a profiling session
    pub profile_env: String,
    pub plan: SessionPlan,
}

/// Parse a kill grace period such as `5s` or `1500ms`
pub fn parse_kill_grace(value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .with_context(|| format!("Invalid kill grace period '{value}', expected e.g. \"5s\""))
}

/// Handles merging of CLI arguments with project configuration
///
/// Implements the precedence rule: CLI > config > default
pub struct ConfigMerger;

impl ConfigMerger {
    pub fn merge(cli: &SupervisorArgs, config: Option<&ProjectConfig>) -> Result<Settings> {
        let service = if !cli.command.is_empty() {
            CommandLine::try_from(cli.command.clone())?
        } else if let Some(command) = config.and_then(|c| c.command.as_ref()) {
            CommandLine::try_from(command).context("Invalid `command` in the config file")?
        } else {
            bail!("No service command given, pass it after `--` or set `command` in profsup.yaml");
        };

        let profile_env = Self::merge_option(
            &cli.profile_env,
            config.and_then(|c| c.profile_env.as_ref()),
        )
        .unwrap_or_else(|| DEFAULT_PROFILE_ENV.to_string());

        let mut plan = SessionPlan::new(service);

        let profile_flags = if cli.profile_flags.is_empty() {
            config.and_then(|c| c.profile_flags.clone())
        } else {
            Some(cli.profile_flags.clone())
        };
        if let Some(profile_flags) = profile_flags {
            plan = plan.with_profile_flags(profile_flags);
        }

        if let Some(pattern) = Self::merge_option(
            &cli.artifact_pattern,
            config.and_then(|c| c.artifact_pattern.as_ref()),
        ) {
            plan = plan.with_artifact_pattern(pattern)?;
        }

        let post_processor = match (
            &cli.post_processor,
            config.and_then(|c| c.post_processor.as_ref()),
        ) {
            (Some(line), _) => Some(CommandLine::parse(line)?),
            (None, Some(command)) => Some(
                CommandLine::try_from(command)
                    .context("Invalid `post-processor` in the config file")?,
            ),
            (None, None) => None,
        };
        if let Some(post_processor) = post_processor {
            plan = plan.with_post_processor(post_processor);
        }

        if let Some(working_directory) = Self::merge_option(
            &cli.working_directory,
            config.and_then(|c| c.working_directory.as_ref()),
        ) {
            plan = plan.with_working_directory(PathBuf::from(working_directory));
        }

        let kill_grace = Self::merge_option(
            &cli.kill_grace,
            config.and_then(|c| c.kill_grace.as_ref()),
        )
        .map(|value| parse_kill_grace(&value))
        .transpose()?;

        let cleanup_artifact =
            cli.cleanup_artifact || config.and_then(|c| c.cleanup_artifact).unwrap_or(false);

        Ok(Settings {
            profile_env,
            plan: plan
                .with_kill_grace(kill_grace)
                .with_cleanup_artifact(cleanup_artifact),
        })
    }

    /// Helper to merge Option values with precedence: CLI > config > None
    fn merge_option<T: Clone>(cli_value: &Option<T>, config_value: Option<&T>) -> Option<T> {
        cli_value.clone().or_else(|| config_value.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandSpec;
    use crate::process::runner::display_command;
    use std::path::Path;

    fn cli(command: &[&str]) -> SupervisorArgs {
        SupervisorArgs {
            command: command.iter().map(|s| s.to_string()).collect(),
            ..SupervisorArgs::default()
        }
    }

    #[test]
    fn test_merge_defaults_only() {
        let settings = ConfigMerger::merge(&cli(&["node", "server.js"]), None).unwrap();

        assert_eq!(settings.profile_env, "DEBUG_PROFILE_TIME");
        assert_eq!(
            settings.plan,
            SessionPlan::new(CommandLine::parse("node server.js").unwrap())
        );
        assert_eq!(settings.plan.kill_grace(), None);
        assert!(!settings.plan.cleanup_artifact());
    }

    #[test]
    fn test_merge_all_from_config() {
        let config = ProjectConfig {
            command: Some(CommandSpec::Line("node app.js".to_string())),
            profile_env: Some("PROFILE_FOR".to_string()),
            profile_flags: Some(vec!["--prof".to_string(), "--interpreted-frames-native-stack".to_string()]),
            artifact_pattern: Some("v8-*.log".to_string()),
            post_processor: Some(CommandSpec::Parts(vec![
                "node".to_string(),
                "--prof-process".to_string(),
                "--preprocess".to_string(),
            ])),
            working_directory: Some("/srv/app".to_string()),
            kill_grace: Some("2s".to_string()),
            cleanup_artifact: Some(true),
        };

        let settings = ConfigMerger::merge(&cli(&[]), Some(&config)).unwrap();

        assert_eq!(settings.profile_env, "PROFILE_FOR");
        assert_eq!(
            display_command(&settings.plan.profiled_service()),
            "node --prof --interpreted-frames-native-stack app.js"
        );
        assert_eq!(settings.plan.artifact_pattern(), "v8-*.log");
        assert_eq!(
            display_command(&settings.plan.post_processor(Path::new("v8-1.log"))),
            "node --prof-process --preprocess v8-1.log"
        );
        assert_eq!(settings.plan.working_directory(), Path::new("/srv/app"));
        assert_eq!(settings.plan.kill_grace(), Some(Duration::from_secs(2)));
        assert!(settings.plan.cleanup_artifact());
    }

    #[test]
    fn test_cli_takes_precedence_over_config() {
        let config = ProjectConfig {
            command: Some(CommandSpec::Line("node app.js".to_string())),
            profile_env: Some("PROFILE_FOR".to_string()),
            profile_flags: Some(vec!["--cpu-prof".to_string()]),
            artifact_pattern: Some("v8-*.log".to_string()),
            kill_grace: Some("2s".to_string()),
            ..Default::default()
        };
        let args = SupervisorArgs {
            profile_env: Some("PROFILE_NOW".to_string()),
            profile_flags: vec!["--prof".to_string()],
            artifact_pattern: Some("custom-*.log".to_string()),
            post_processor: Some("cat".to_string()),
            kill_grace: Some("500ms".to_string()),
            ..cli(&["node", "server.js"])
        };

        let settings = ConfigMerger::merge(&args, Some(&config)).unwrap();

        assert_eq!(settings.profile_env, "PROFILE_NOW");
        assert_eq!(
            display_command(&settings.plan.profiled_service()),
            "node --prof server.js"
        );
        assert_eq!(settings.plan.artifact_pattern(), "custom-*.log");
        assert_eq!(
            display_command(&settings.plan.post_processor(Path::new("custom-1.log"))),
            "cat custom-1.log"
        );
        assert_eq!(settings.plan.kill_grace(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_missing_command_is_an_error() {
        let err = ConfigMerger::merge(&cli(&[]), Some(&ProjectConfig::default())).unwrap_err();
        assert!(err.to_string().contains("No service command given"));
    }

    #[test]
    fn test_invalid_kill_grace_is_an_error() {
        let args = SupervisorArgs {
            kill_grace: Some("soon".to_string()),
            ..cli(&["node", "server.js"])
        };

        assert!(ConfigMerger::merge(&args, None).is_err());
    }

    #[test]
    fn test_malformed_cli_artifact_pattern_is_an_error() {
        let args = SupervisorArgs {
            artifact_pattern: Some("isolate-[.log".to_string()),
            ..cli(&["node", "server.js"])
        };

        let err = ConfigMerger::merge(&args, None).unwrap_err();
        assert!(err.to_string().contains("Invalid artifact pattern"));
    }

    #[test]
    fn test_parse_kill_grace() {
        assert_eq!(parse_kill_grace("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_kill_grace("1500ms").unwrap(), Duration::from_millis(1500));
        assert!(parse_kill_grace("5").is_err());
    }
}
