use super::runner::{ChildControl, TerminationRequest};
use crate::prelude::*;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A countdown armed against a running child.
///
/// Once `after` elapses, a graceful termination request is issued. The terminator does not wait
/// for the child to exit: the child's own exit notification is what callers should await.
/// When `kill_grace` is set and the child is still running that long after the graceful request,
/// it is killed.
pub struct TimedTerminator {
    task: JoinHandle<()>,
}

impl TimedTerminator {
    pub fn arm(control: ChildControl, after: Duration, kill_grace: Option<Duration>) -> Self {
        let task = tokio::spawn(async move {
            if !after.is_zero() {
                tokio::time::sleep(after).await;
            }

            if !control.request(TerminationRequest::Graceful) {
                debug!("Child exited before the profiling window elapsed");
                return;
            }
            info!(
                "Profiling window of {} elapsed, interrupting the profiled service",
                humantime::format_duration(after)
            );

            let Some(grace) = kill_grace else {
                return;
            };
            tokio::time::sleep(grace).await;
            if control.request(TerminationRequest::Forced) {
                warn!(
                    "Profiled service still running {} after the interrupt, killing it",
                    humantime::format_duration(grace)
                );
            }
        });

        Self { task }
    }

    /// Cancel any pending request. Has no effect on requests already sent.
    pub fn disarm(self) {
        self.task.abort();
    }
}
