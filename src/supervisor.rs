use crate::prelude::*;
use crate::session::{CommandLine, ProfileSession, SessionConfig, SessionOutcome, SessionPlan};
use async_trait::async_trait;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;

/// The long-running service being supervised.
#[async_trait(?Send)]
pub trait Service {
    /// Start the service and run it until it stops, returning its exit code.
    async fn start(&self) -> Result<i32>;
}

/// A service started by running a command with the supervisor's own stdio.
pub struct CommandService {
    command: CommandLine,
    working_directory: PathBuf,
}

impl CommandService {
    pub fn new(command: CommandLine, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            command,
            working_directory: working_directory.into(),
        }
    }

    /// The unprofiled counterpart of the plan's profiled service.
    pub fn from_plan(plan: &SessionPlan) -> Self {
        Self::new(plan.service_command().clone(), plan.working_directory())
    }
}

#[async_trait(?Send)]
impl Service for CommandService {
    async fn start(&self) -> Result<i32> {
        let mut cmd = self.command.to_command();
        cmd.current_dir(&self.working_directory);

        info!("Starting `{}`", self.command);
        let status = cmd
            .status()
            .await
            .with_context(|| format!("Failed to start `{}`", self.command))?;
        debug!(
            "Service exit code = {:?}, service signal = {:?}",
            status.code(),
            status.signal()
        );

        Ok(match (status.code(), status.signal()) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        })
    }
}

/// What happened during one supervised run.
#[derive(Debug)]
pub struct Supervision {
    /// `None` when profiling was not requested.
    pub session: Option<SessionOutcome>,
    pub exit_code: i32,
}

/// Start `service`, after one profiling session if `config` asks for it.
///
/// The session always runs to completion, successfully or not, before the service starts.
/// Errors of the session are never propagated: only the service's own start failure is.
pub async fn supervise(
    config: SessionConfig,
    plan: &SessionPlan,
    service: &dyn Service,
) -> Result<Supervision> {
    let session = match config {
        SessionConfig::Disabled => {
            debug!("Profiling not requested, starting the service right away");
            None
        }
        SessionConfig::Enabled { duration } => {
            let outcome = ProfileSession::new(duration, plan).run().await;
            info!(
                "Profiling session ended ({}), restarting the service without profiling",
                outcome.final_state()
            );
            Some(outcome)
        }
    };

    let exit_code = service.start().await?;
    Ok(Supervision { session, exit_code })
}
