//! Configuration for a batch progress view and its streaming connection.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProgressError, Result};

/// Path segment that precedes the batch identifier in page locations.
pub const DEFAULT_BATCH_PATH_SEGMENT: &str = "batchupgradeoperation";

/// Path prefix of the streaming endpoint; the batch id and a trailing slash follow.
pub const DEFAULT_WS_PATH_PREFIX: &str = "/ws/batch-upgrade/";

/// Reconnection policy of the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Time allowed for a single connection attempt.
    pub connect_timeout_ms: u64,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_retries: u32,
    /// Fixed wait between attempts.
    pub retry_interval_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 7000,
            max_retries: 5,
            retry_interval_ms: 3000,
        }
    }
}

impl ReconnectPolicy {
    /// Connection attempt timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Backoff between attempts as a duration.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Configuration for one attached batch view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Externally configured host override for the streaming endpoint.
    pub api_host: Option<String>,
    /// Location path segment that is followed by the batch identifier.
    pub batch_path_segment: String,
    /// Endpoint path prefix.
    pub ws_path_prefix: String,
    /// How long a row stays highlighted after an update.
    pub highlight_ms: u64,
    /// Interval between readiness probes during initialization.
    pub poll_interval_ms: u64,
    /// Streaming connection retry behaviour.
    pub reconnect: ReconnectPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            api_host: None,
            batch_path_segment: DEFAULT_BATCH_PATH_SEGMENT.to_string(),
            ws_path_prefix: DEFAULT_WS_PATH_PREFIX.to_string(),
            highlight_ms: 1000,
            poll_interval_ms: 50,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: WatchConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the host override.
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Highlight window as a duration.
    pub fn highlight_window(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    /// Readiness polling interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ProgressError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.batch_path_segment.trim().is_empty() {
            return Err(ProgressError::Config(
                "batch_path_segment must not be empty".into(),
            ));
        }
        if !self.ws_path_prefix.starts_with('/') {
            return Err(ProgressError::Config(format!(
                "ws_path_prefix must start with '/': {}",
                self.ws_path_prefix
            )));
        }
        Ok(())
    }
}
