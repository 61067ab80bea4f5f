//! Errors raised inside a profiling session.
//!
//! None of these ever reach the wrapped service's startup: the session
//! controller logs them as warnings and moves to its `Failed` state.

use std::path::PathBuf;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// An external command could not be launched at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// No artifact matched the expected pattern after the profiled child exited.
    #[error("no file matching `{pattern}` in {}", directory.display())]
    NotFound { pattern: String, directory: PathBuf },

    /// Listing the artifact directory or reading a file's metadata failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact pattern is empty or not a valid glob.
    #[error("invalid artifact pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Spawn { .. } => "spawn_error",
            SessionError::NotFound { .. } => "artifact_not_found",
            SessionError::Io { .. } => "io_error",
            SessionError::InvalidPattern { .. } => "invalid_pattern",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_pattern_and_directory() {
        let err = SessionError::NotFound {
            pattern: "isolate-*.log".to_string(),
            directory: PathBuf::from("/srv/app"),
        };
        assert_eq!(err.to_string(), "no file matching `isolate-*.log` in /srv/app");
        assert_eq!(err.as_label(), "artifact_not_found");
    }

    #[test]
    fn test_spawn_error_keeps_its_source() {
        let err = SessionError::Spawn {
            command: "node --prof-process".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to spawn `node --prof-process`"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
