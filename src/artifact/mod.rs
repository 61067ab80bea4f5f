use crate::error::SessionError;
use crate::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file matching the artifact pattern, seen during a single discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArtifactCandidate {
    path: PathBuf,
    modified: SystemTime,
}

impl ArtifactCandidate {
    /// Total order used for the selection: modification time first, then the path so that
    /// two artifacts written within the same timestamp resolve the same way on every run.
    fn sort_key(&self) -> (SystemTime, &Path) {
        (self.modified, self.path.as_path())
    }
}

/// Find the most recently modified file of `directory` whose name matches `pattern`.
///
/// The pattern is a shell-style glob matched against file names only, e.g. `isolate-*.log`.
/// Directories are ignored, symlinks are followed.
///
/// This must only be called once the process producing the artifact has exited, otherwise the
/// selected file may still be partially written.
pub fn locate_latest(pattern: &str, directory: &Path) -> Result<PathBuf, SessionError> {
    if pattern.is_empty() {
        return Err(SessionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern is empty".to_string(),
        });
    }
    let matcher = glob::Pattern::new(pattern).map_err(|e| SessionError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let entries = fs::read_dir(directory).map_err(|source| SessionError::Io {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut latest: Option<ArtifactCandidate> = None;
    for entry in entries {
        let entry = entry.map_err(|source| SessionError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        if !matcher.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let path = entry.path();
        let metadata = fs::metadata(&path).map_err(|source| SessionError::Io {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().map_err(|source| SessionError::Io {
            path: path.clone(),
            source,
        })?;

        let candidate = ArtifactCandidate { path, modified };
        trace!("Artifact candidate: {candidate:?}");
        let is_newer = latest
            .as_ref()
            .is_none_or(|current| candidate.sort_key() > current.sort_key());
        if is_newer {
            latest = Some(candidate);
        }
    }

    let latest = latest.ok_or_else(|| SessionError::NotFound {
        pattern: pattern.to_string(),
        directory: directory.to_path_buf(),
    })?;
    debug!("Selected artifact {}", latest.path.display());
    Ok(latest.path)
}

/// Delete an artifact once its report has been captured.
pub fn remove_artifact(path: &Path) -> Result<()> {
    fs::remove_file(path)
        .with_context(|| format!("Failed to remove artifact {}", path.display()))?;
    debug!("Removed artifact {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_with_mtime(dir: &Path, name: &str, secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
        path
    }

    #[test]
    fn test_selects_the_most_recent_match() {
        let dir = TempDir::new().unwrap();
        write_with_mtime(dir.path(), "isolate-A.log", 10);
        let b = write_with_mtime(dir.path(), "isolate-B.log", 30);
        write_with_mtime(dir.path(), "isolate-C.log", 20);

        assert_eq!(locate_latest("isolate-*.log", dir.path()).unwrap(), b);
    }

    #[test]
    fn test_ignores_files_not_matching_the_pattern() {
        let dir = TempDir::new().unwrap();
        let expected = write_with_mtime(dir.path(), "isolate-1.log", 10);
        write_with_mtime(dir.path(), "server.log", 50);
        write_with_mtime(dir.path(), "isolate-2.txt", 60);

        assert_eq!(locate_latest("isolate-*.log", dir.path()).unwrap(), expected);
    }

    #[test]
    fn test_ignores_matching_directories() {
        let dir = TempDir::new().unwrap();
        let expected = write_with_mtime(dir.path(), "isolate-1.log", 10);
        fs::create_dir(dir.path().join("isolate-2.log")).unwrap();

        assert_eq!(locate_latest("isolate-*.log", dir.path()).unwrap(), expected);
    }

    #[test]
    fn test_equal_timestamps_resolve_by_name() {
        let dir = TempDir::new().unwrap();
        write_with_mtime(dir.path(), "isolate-a.log", 42);
        let expected = write_with_mtime(dir.path(), "isolate-b.log", 42);

        assert_eq!(locate_latest("isolate-*.log", dir.path()).unwrap(), expected);
    }

    #[test]
    fn test_no_match_is_not_found() {
        let dir = TempDir::new().unwrap();
        write_with_mtime(dir.path(), "server.log", 10);

        let err = locate_latest("isolate-*.log", dir.path()).unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn test_missing_directory_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = locate_latest("isolate-*.log", &missing).unwrap_err();
        assert!(matches!(err, SessionError::Io { .. }), "{err:?}");
    }

    #[rstest]
    #[case("")]
    #[case("isolate-[.log")]
    fn test_invalid_patterns_are_rejected(#[case] pattern: &str) {
        let dir = TempDir::new().unwrap();

        let err = locate_latest(pattern, dir.path()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPattern { .. }), "{err:?}");
    }

    #[test]
    fn test_remove_artifact() {
        let dir = TempDir::new().unwrap();
        let path = write_with_mtime(dir.path(), "isolate-1.log", 10);

        remove_artifact(&path).unwrap();
        assert!(!path.exists());
        assert!(remove_artifact(&path).is_err());
    }
}
