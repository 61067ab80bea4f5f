use std::path::PathBuf;

use crate::{
    config::{ProjectConfig, merger::ConfigMerger},
    local_logger::{PROFSUP_U8_COLOR_CODE, init_local_logger},
    prelude::*,
    session::SessionConfig,
    supervisor::{CommandService, supervise},
};
use clap::{
    Args, Parser,
    builder::{Styles, styling},
};

fn create_styles() -> Styles {
    styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(
            styling::Ansi256Color(PROFSUP_U8_COLOR_CODE).on_default() | styling::Effects::BOLD,
        )
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Run a service under a profiler for a bounded window, then restart it unprofiled",
    styles = create_styles()
)]
pub struct Cli {
    /// Path to a profsup.yaml file
    /// If not provided, profsup.yaml, profsup.yml, .profsup.yaml or .profsup.yml is looked up
    /// in the current directory.
    #[arg(long, env = "PROFSUP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub args: SupervisorArgs,
}

/// Options shared by the CLI and the config file. Unset values fall back to the config file,
/// then to the defaults.
#[derive(Args, Debug, Default, Clone)]
pub struct SupervisorArgs {
    /// Environment variable whose value requests a profiling session, in milliseconds
    /// [default: DEBUG_PROFILE_TIME]
    #[arg(long)]
    pub profile_env: Option<String>,

    /// Flag putting the service's runtime in profiling mode, inserted right after the program.
    /// Can be repeated. [default: --prof]
    #[arg(long = "profile-flag", allow_hyphen_values = true)]
    pub profile_flags: Vec<String>,

    /// Glob matching the files written by the profiler [default: isolate-*.log]
    #[arg(long)]
    pub artifact_pattern: Option<String>,

    /// Command turning a profiling artifact into a report, the artifact path is appended to it
    /// [default: "node --prof-process"]
    #[arg(long, allow_hyphen_values = true)]
    pub post_processor: Option<String>,

    /// Directory in which the service runs and profiling artifacts are searched
    #[arg(long)]
    pub working_directory: Option<String>,

    /// Kill the profiled service if it is still running this long after being interrupted
    /// (e.g. "5s"). By default it is never killed.
    #[arg(long)]
    pub kill_grace: Option<String>,

    /// Delete the profiling artifact once the report has been printed
    #[arg(long, default_value = "false")]
    pub cleanup_artifact: bool,

    /// The command starting the service
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// Run the supervisor and return the exit code of the wrapped service
pub async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_local_logger()?;

    let current_dir = std::env::current_dir().context("Failed to get the current directory")?;
    let project_config = ProjectConfig::discover_and_load(cli.config.as_deref(), &current_dir)?;
    let settings = ConfigMerger::merge(&cli.args, project_config.as_ref())?;

    let session_config = SessionConfig::from_env(&settings.profile_env);
    let service = CommandService::from_plan(&settings.plan);
    let supervision = supervise(session_config, &settings.plan, &service).await?;
    Ok(supervision.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "profsup",
            "--profile-env",
            "PROFILE_FOR",
            "--profile-flag",
            "--prof",
            "--profile-flag",
            "--no-logfile-per-isolate",
            "--post-processor",
            "node --prof-process --preprocess",
            "--kill-grace",
            "5s",
            "--cleanup-artifact",
            "--",
            "node",
            "server.js",
            "--port",
            "8080",
        ])
        .unwrap();

        assert_eq!(cli.args.profile_env.as_deref(), Some("PROFILE_FOR"));
        assert_eq!(
            cli.args.profile_flags,
            ["--prof", "--no-logfile-per-isolate"]
        );
        assert_eq!(
            cli.args.post_processor.as_deref(),
            Some("node --prof-process --preprocess")
        );
        assert_eq!(cli.args.kill_grace.as_deref(), Some("5s"));
        assert!(cli.args.cleanup_artifact);
        assert_eq!(cli.args.command, ["node", "server.js", "--port", "8080"]);
    }

    #[test]
    fn test_parse_without_options() {
        let cli = Cli::try_parse_from(["profsup", "--", "./serve"]).unwrap();

        assert!(cli.args.profile_flags.is_empty());
        assert!(!cli.args.cleanup_artifact);
        assert_eq!(cli.args.command, ["./serve"]);
    }

    #[test]
    fn test_config_path_from_env() {
        temp_env::with_var("PROFSUP_CONFIG", Some("/etc/profsup.yaml"), || {
            let cli = Cli::try_parse_from(["profsup", "--", "./serve"]).unwrap();
            assert_eq!(cli.config, Some(PathBuf::from("/etc/profsup.yaml")));
        });
    }

    #[test]
    fn test_command_requires_separator() {
        assert!(Cli::try_parse_from(["profsup", "node", "server.js"]).is_err());
    }
}
