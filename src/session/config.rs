use crate::prelude::*;
use std::env;
use std::time::Duration;

/// Name of the environment variable requesting a profiling session, unless overridden.
pub const DEFAULT_PROFILE_ENV: &str = "DEBUG_PROFILE_TIME";

/// Whether this process starts with a profiling session, and for how long.
///
/// Built once at startup and never mutated. There is no duration to consult when profiling is
/// disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionConfig {
    Disabled,
    Enabled { duration: Duration },
}

impl SessionConfig {
    /// Read the profiling toggle from the environment variable `name`.
    pub fn from_env(name: &str) -> Self {
        let value = env::var(name).ok();
        let config = Self::from_value(value.as_deref());
        debug!("{name}={value:?} -> {config:?}");
        config
    }

    /// Absent or empty means disabled. Otherwise profiling is enabled, and the value is the
    /// profiling duration: a number of milliseconds, or a duration such as `1500ms` or `2s`.
    ///
    /// An unparsable value still enables profiling, with a zero duration.
    pub fn from_value(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
            return SessionConfig::Disabled;
        };

        let duration = parse_duration(value).unwrap_or_else(|e| {
            warn!("{e:#}, profiling will stop immediately");
            Duration::ZERO
        });
        SessionConfig::Enabled { duration }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, SessionConfig::Enabled { .. })
    }
}

fn parse_duration(value: &str) -> Result<Duration> {
    if let Ok(millis) = value.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }

    humantime::parse_duration(value).with_context(|| {
        format!(
            "Invalid profiling duration '{value}'. Expected a number of milliseconds or a duration like '500ms', '2s'"
        )
    })
}
