//! Command line and environment configuration.

use crate::error::{Error, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Settings of the `telemetry-relay` binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Telemetry log written by the ground station receiver
    #[arg(env = "RELAY_FILE")]
    pub file: PathBuf,

    /// Base URL of the collection API
    #[arg(long, env = "RELAY_API_URL", default_value = "http://localhost:8000/api/")]
    pub api_url: String,

    /// Delay between reads when no new line is available, in milliseconds
    #[arg(long, env = "RELAY_POLL_INTERVAL_MS", default_value = "50")]
    pub poll_interval_ms: u64,

    /// Timeout of a single API request, in seconds
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Resume the queue this many seconds after a failed request pauses it; 0 stays paused
    #[arg(long, env = "RELAY_RESUME_AFTER_SECS", default_value = "10")]
    pub resume_after_secs: u64,

    /// Log filter, e.g. `info` or `telemetry_relay=debug`
    #[arg(long, env = "RELAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "RELAY_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Config {
    /// Rejects settings clap cannot check: zero durations and a malformed
    /// API URL.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config {
                message: "poll interval must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config {
                message: "request timeout must be greater than zero".to_string(),
            });
        }
        Url::parse(&self.api_url).map_err(|e| Error::Config {
            message: format!("invalid API URL '{}': {}", self.api_url, e),
        })?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resume_after(&self) -> Duration {
        Duration::from_secs(self.resume_after_secs)
    }
}
