use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    num::{NonZeroU32, NonZeroUsize},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::ConfigError;

pub const DEFAULT_TOTAL_SCREWS: usize = 19;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Fixed header fields printed on every cycle report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationInfo {
    pub resource: String,
    pub tool_type: String,
    pub model: String,
}

impl Default for StationInfo {
    fn default() -> Self {
        Self {
            resource: "MAC-LINE02".into(),
            tool_type: "DEPRAG-AS712".into(),
            model: "ARCA".into(),
        }
    }
}

/// On-disk monitor configuration. Missing keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub total_screws: usize,
    pub poll_interval_ms: u64,
    pub database_path: PathBuf,
    pub outbox_dir: PathBuf,
    pub station: StationInfo,
    /// `None` retries a failing report on every tick for the whole session.
    pub report_attempt_limit: Option<u32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            total_screws: DEFAULT_TOTAL_SCREWS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            database_path: PathBuf::from("screwwatch.sqlite3"),
            outbox_dir: PathBuf::from("outbox"),
            station: StationInfo::default(),
            report_attempt_limit: None,
        }
    }
}

/// Engine parameters after validation. Holding one proves the values are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub cycle_size: NonZeroUsize,
    pub poll_interval: Duration,
    pub report_attempt_limit: Option<NonZeroU32>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            cycle_size: NonZeroUsize::new(DEFAULT_TOTAL_SCREWS).unwrap_or(NonZeroUsize::MIN),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            report_attempt_limit: None,
        }
    }
}

impl MonitorConfig {
    /// Reads `path` if it exists, otherwise starts from defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SCREWWATCH_DB") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("SCREWWATCH_OUTBOX") {
            self.outbox_dir = PathBuf::from(path);
        }
        if let Some(raw) = lookup("SCREWWATCH_POLL_MS") {
            self.poll_interval_ms =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        name: "SCREWWATCH_POLL_MS",
                        value: raw.clone(),
                    })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<MonitorSettings, ConfigError> {
        let cycle_size = NonZeroUsize::new(self.total_screws).ok_or(ConfigError::ZeroCycleSize)?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        let report_attempt_limit = match self.report_attempt_limit {
            Some(limit) => Some(NonZeroU32::new(limit).ok_or(ConfigError::ZeroAttemptLimit)?),
            None => None,
        };

        Ok(MonitorSettings {
            cycle_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            report_attempt_limit,
        })
    }

    pub fn persist(&self, path: &Path) -> anyhow::Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
