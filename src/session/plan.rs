use crate::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_PROFILE_FLAGS: &[&str] = &["--prof"];
pub const DEFAULT_ARTIFACT_PATTERN: &str = "isolate-*.log";
pub const DEFAULT_POST_PROCESSOR: &[&str] = &["node", "--prof-process"];

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Split a shell-like string, e.g. `node --prof-process`, into a command line.
    pub fn parse(line: &str) -> Result<Self> {
        let parts = shell_words::split(line)
            .with_context(|| format!("Failed to parse the command `{line}`"))?;
        Self::try_from(parts)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl TryFrom<Vec<String>> for CommandLine {
    type Error = Error;

    fn try_from(mut parts: Vec<String>) -> Result<Self> {
        ensure!(!parts.is_empty(), "The command must not be empty");
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            std::iter::once(&self.program).chain(&self.args).join(" ")
        )
    }
}

/// Everything a profiling session needs to know about the outside world: how the service is
/// started, how the runtime is put in profiling mode, where its artifact lands and what turns
/// that artifact into a report.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    service: CommandLine,
    profile_flags: Vec<String>,
    artifact_pattern: String,
    post_processor: CommandLine,
    working_directory: PathBuf,
    kill_grace: Option<Duration>,
    cleanup_artifact: bool,
}

impl SessionPlan {
    /// A plan using the default profiling flags, artifact pattern and post-processor, running in
    /// the current directory.
    pub fn new(service: CommandLine) -> Self {
        Self {
            service,
            profile_flags: DEFAULT_PROFILE_FLAGS.iter().map(|s| s.to_string()).collect(),
            artifact_pattern: DEFAULT_ARTIFACT_PATTERN.to_string(),
            post_processor: CommandLine {
                program: DEFAULT_POST_PROCESSOR[0].to_string(),
                args: DEFAULT_POST_PROCESSOR[1..].iter().map(|s| s.to_string()).collect(),
            },
            working_directory: PathBuf::from("."),
            kill_grace: None,
            cleanup_artifact: false,
        }
    }

    pub fn with_profile_flags(mut self, profile_flags: Vec<String>) -> Self {
        self.profile_flags = profile_flags;
        self
    }

    pub fn with_artifact_pattern(mut self, artifact_pattern: impl Into<String>) -> Result<Self> {
        let artifact_pattern = artifact_pattern.into();
        ensure!(
            !artifact_pattern.is_empty(),
            "The artifact pattern must not be empty"
        );
        glob::Pattern::new(&artifact_pattern)
            .with_context(|| format!("Invalid artifact pattern '{artifact_pattern}'"))?;
        self.artifact_pattern = artifact_pattern;
        Ok(self)
    }

    pub fn with_post_processor(mut self, post_processor: CommandLine) -> Self {
        self.post_processor = post_processor;
        self
    }

    pub fn with_working_directory(mut self, working_directory: impl Into<PathBuf>) -> Self {
        self.working_directory = working_directory.into();
        self
    }

    pub fn with_kill_grace(mut self, kill_grace: Option<Duration>) -> Self {
        self.kill_grace = kill_grace;
        self
    }

    pub fn with_cleanup_artifact(mut self, cleanup_artifact: bool) -> Self {
        self.cleanup_artifact = cleanup_artifact;
        self
    }

    pub fn service_command(&self) -> &CommandLine {
        &self.service
    }

    pub fn artifact_pattern(&self) -> &str {
        &self.artifact_pattern
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn kill_grace(&self) -> Option<Duration> {
        self.kill_grace
    }

    pub fn cleanup_artifact(&self) -> bool {
        self.cleanup_artifact
    }

    /// The service command with the profiling flags inserted right after the program, so that
    /// they reach the runtime rather than the service's own argument parsing.
    pub fn profiled_service(&self) -> Command {
        let mut cmd = Command::new(&self.service.program);
        cmd.args(&self.profile_flags)
            .args(&self.service.args)
            .current_dir(&self.working_directory);
        cmd
    }

    /// The post-processor command, run in the working directory. The artifact is passed relative
    /// to that directory when it lies within it, since `artifact` is relative to our own cwd.
    pub fn post_processor(&self, artifact: &Path) -> Command {
        let artifact = artifact
            .strip_prefix(&self.working_directory)
            .unwrap_or(artifact);
        let mut cmd = self.post_processor.to_command();
        cmd.arg(artifact).current_dir(&self.working_directory);
        cmd
    }
}
