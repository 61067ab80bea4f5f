use crate::prelude::*;
use crate::session::CommandLine;
use serde::{Deserialize, Serialize};

/// Project-level configuration from a profsup.yaml file
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Command starting the wrapped service
    pub command: Option<CommandSpec>,
    /// Environment variable requesting a profiling session
    pub profile_env: Option<String>,
    /// Flags putting the service's runtime in profiling mode
    pub profile_flags: Option<Vec<String>>,
    /// Glob matching the artifacts written by the profiler
    pub artifact_pattern: Option<String>,
    /// Command turning an artifact into a report
    pub post_processor: Option<CommandSpec>,
    /// Directory in which the service runs and artifacts are searched
    pub working_directory: Option<String>,
    /// Delay after the interrupt before the profiled service is killed (e.g. "5s")
    pub kill_grace: Option<String>,
    /// Delete the artifact once its report has been captured
    pub cleanup_artifact: Option<bool>,
}

/// A command, written either as a single shell-like string or as a list of arguments.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Parts(Vec<String>),
}

impl TryFrom<&CommandSpec> for CommandLine {
    type Error = Error;

    fn try_from(spec: &CommandSpec) -> Result<Self> {
        match spec {
            CommandSpec::Line(line) => CommandLine::parse(line),
            CommandSpec::Parts(parts) => CommandLine::try_from(parts.clone()),
        }
    }
}
