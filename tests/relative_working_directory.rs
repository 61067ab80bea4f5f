//! Kept in its own test binary: it changes the process-wide current directory.

use profile_supervisor::session::CommandLine;
use profile_supervisor::{ProfileSession, SessionPlan, SessionState};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// A relative working directory is resolved once, both for the service and the post-processor
#[test_log::test(tokio::test)]
async fn test_relative_working_directory() {
    let base = TempDir::new().unwrap();
    fs::create_dir(base.path().join("app")).unwrap();
    std::env::set_current_dir(base.path()).unwrap();

    let service = CommandLine::try_from(vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo ticks > isolate-1.log".to_string(),
    ])
    .unwrap();
    let plan = SessionPlan::new(service)
        .with_profile_flags(vec![])
        .with_post_processor(CommandLine::parse("cat").unwrap())
        .with_working_directory("app");

    let outcome = ProfileSession::new(Duration::from_secs(5), &plan)
        .run()
        .await;

    assert_eq!(outcome.final_state(), SessionState::Done);
    let report = outcome.report().unwrap();
    assert_eq!(report.artifact, Path::new("app/isolate-1.log"));
    assert_eq!(report.body, "ticks\n");
}
