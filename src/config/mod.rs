use crate::prelude::*;
use crate::session::CommandLine;
use std::fs;
use std::path::Path;

mod interfaces;
pub mod merger;

pub use interfaces::*;

/// Config file names in priority order
const CONFIG_FILENAMES: &[&str] = &[
    "profsup.yaml",
    "profsup.yml",
    ".profsup.yaml",
    ".profsup.yml",
];

impl ProjectConfig {
    /// Discover and load the project configuration file
    ///
    /// If `config_path_override` is provided, load from that path only (error if not found).
    /// Otherwise try the known filenames in `current_dir`, in priority order.
    ///
    /// Returns `Ok(None)` when no config file is found.
    pub fn discover_and_load(
        config_path_override: Option<&Path>,
        current_dir: &Path,
    ) -> Result<Option<ProjectConfig>> {
        if let Some(config_path) = config_path_override {
            let config = Self::load_from_path(config_path)
                .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
            return Ok(Some(config));
        }

        for filename in CONFIG_FILENAMES {
            let candidate_path = current_dir.join(filename);
            if candidate_path.exists() {
                debug!("Found config file at {}", candidate_path.display());
                return Self::load_from_path(&candidate_path).map(Some);
            }
        }

        Ok(None)
    }

    /// Load and parse config from a specific path
    fn load_from_path(path: &Path) -> Result<Self> {
        let config_content = fs::read(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: Self = serde_yaml::from_slice(&config_content)
            .with_context(|| format!("Failed to parse profsup config at {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Reject values that would only fail once a profiling session is running
    fn validate(&self) -> Result<()> {
        if let Some(command) = &self.command {
            CommandLine::try_from(command).context("Invalid `command`")?;
        }
        if let Some(post_processor) = &self.post_processor {
            CommandLine::try_from(post_processor).context("Invalid `post-processor`")?;
        }
        if self.artifact_pattern.as_deref() == Some("") {
            bail!("Invalid `artifact-pattern`: the pattern must not be empty");
        }
        if let Some(pattern) = &self.artifact_pattern {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid `artifact-pattern` '{pattern}'"))?;
        }
        if self.profile_env.as_deref() == Some("") {
            bail!("Invalid `profile-env`: the variable name must not be empty");
        }
        if let Some(kill_grace) = &self.kill_grace {
            merger::parse_kill_grace(kill_grace)?;
        }
        Ok(())
    }
}
