//! One profiling session: run the service under the profiler for a bounded window, then turn
//! the artifact it left behind into a report.
//!
//! The controller walks through [`SessionState`] in order. The artifact is only looked up once
//! the profiled child's termination has been observed, never when the timer fires, so the
//! post-processor cannot read a partially written artifact.

mod config;
mod plan;

pub use config::{DEFAULT_PROFILE_ENV, SessionConfig};
pub use plan::{
    CommandLine, DEFAULT_ARTIFACT_PATTERN, DEFAULT_POST_PROCESSOR, DEFAULT_PROFILE_FLAGS,
    SessionPlan,
};

use crate::artifact::{locate_latest, remove_artifact};
use crate::error::SessionError;
use crate::prelude::*;
use crate::process::{self, OutputPolicy, TimedTerminator};
use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Spawning,
    Profiling,
    Terminating,
    Locating,
    PostProcessing,
    Reporting,
    Done,
    Failed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Spawning => write!(f, "spawning"),
            SessionState::Profiling => write!(f, "profiling"),
            SessionState::Terminating => write!(f, "terminating"),
            SessionState::Locating => write!(f, "locating"),
            SessionState::PostProcessing => write!(f, "post-processing"),
            SessionState::Reporting => write!(f, "reporting"),
            SessionState::Done => write!(f, "done"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// The post-processor's output for one profiling artifact.
#[derive(Debug)]
pub struct CapturedReport {
    pub artifact: PathBuf,
    /// Everything the post-processor wrote on stdout, as is.
    pub body: String,
    pub post_processor_status: Option<ExitStatus>,
}

#[derive(Debug)]
pub struct SessionFailure {
    /// The state the session was in when the error occurred.
    pub state: SessionState,
    pub error: SessionError,
}

#[derive(Debug)]
pub struct SessionOutcome {
    /// Every state the session went through, starting with [`SessionState::Idle`].
    pub history: Vec<SessionState>,
    pub result: std::result::Result<CapturedReport, SessionFailure>,
}

impl SessionOutcome {
    pub fn final_state(&self) -> SessionState {
        self.history.last().copied().unwrap_or(SessionState::Idle)
    }

    pub fn report(&self) -> Option<&CapturedReport> {
        self.result.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        self.result.as_ref().err()
    }
}

pub struct ProfileSession<'a> {
    duration: Duration,
    plan: &'a SessionPlan,
    state: SessionState,
    history: Vec<SessionState>,
}

impl<'a> ProfileSession<'a> {
    pub fn new(duration: Duration, plan: &'a SessionPlan) -> Self {
        Self {
            duration,
            plan,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    /// Run the session to completion.
    ///
    /// Never fails: errors are logged as warnings and end the session in
    /// [`SessionState::Failed`], so that the caller can go on and start the service.
    pub async fn run(mut self) -> SessionOutcome {
        let result = match self.drive().await {
            Ok(report) => Ok(report),
            Err(error) => {
                let state = self.state;
                warn!(
                    "Profiling session failed while {state} ({}): {error}",
                    error.as_label()
                );
                self.transition(SessionState::Failed);
                Err(SessionFailure { state, error })
            }
        };

        SessionOutcome {
            history: self.history,
            result,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Profiling session: {} -> {next}", self.state);
        self.state = next;
        self.history.push(next);
    }

    async fn drive(&mut self) -> Result<CapturedReport, SessionError> {
        self.transition(SessionState::Spawning);
        let profiled = process::spawn(self.plan.profiled_service(), OutputPolicy::Forward)?;
        info!(
            "Profiling `{}` (pid {}) for {}",
            profiled.command(),
            profiled
                .pid()
                .map_or_else(|| "unknown".to_string(), |pid| pid.to_string()),
            humantime::format_duration(self.duration)
        );

        self.transition(SessionState::Profiling);
        start_group!("Profiling the service");
        let terminator =
            TimedTerminator::arm(profiled.control(), self.duration, self.plan.kill_grace());
        let exit = profiled.wait().await;
        terminator.disarm();
        end_group!();

        self.transition(SessionState::Terminating);
        info!("Profiled service terminated with {}", exit.describe());

        self.transition(SessionState::Locating);
        let artifact = locate_latest(self.plan.artifact_pattern(), self.plan.working_directory())?;
        info!("Processing profiling artifact {}", artifact.display());

        self.transition(SessionState::PostProcessing);
        let post_processor = process::spawn(
            self.plan.post_processor(&artifact),
            OutputPolicy::Accumulate,
        )?;
        let exit = post_processor.wait().await;
        debug!("Post-processor terminated with {}", exit.describe());

        self.transition(SessionState::Reporting);
        let report = CapturedReport {
            artifact,
            body: exit.output.unwrap_or_default(),
            post_processor_status: exit.status,
        };
        emit_report(&report);
        if self.plan.cleanup_artifact() {
            if let Err(e) = remove_artifact(&report.artifact) {
                warn!("{e:#}");
            }
        }

        self.transition(SessionState::Done);
        Ok(report)
    }
}

fn emit_report(report: &CapturedReport) {
    start_group!("Profiling report");
    if report.body.trim().is_empty() {
        warn!(
            "The post-processor produced no output for {}",
            report.artifact.display()
        );
    } else {
        info!("{}", report.body.trim_end());
    }
    end_group!();
}
