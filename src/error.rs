//! Startup errors that must stop the monitor before polling begins.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("total_screws must be at least 1")]
    ZeroCycleSize,

    #[error("poll_interval_ms must be at least 1")]
    ZeroPollInterval,

    #[error("report_attempt_limit must be at least 1 when set")]
    ZeroAttemptLimit,

    #[error("invalid value for {name}: {value:?}")]
    InvalidOverride { name: &'static str, value: String },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
