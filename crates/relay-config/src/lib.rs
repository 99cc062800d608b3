//! Shared configuration for the editor relay.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then an
//! optional TOML file (`--config-path` or `RELAY_CONFIG_PATH`), then
//! `RELAY_*` environment variables, and finally command-line flags. The
//! resulting [`Config`] tells the relay where the editor listens, how hard to
//! retry transient failures, and how to emit logs.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;

pub use defaults::{
    DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_EDITOR_HOST, DEFAULT_EDITOR_PORT, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
    default_editor_endpoint, default_log_filter, default_log_filter_string, default_log_format,
};
pub use endpoint::{EndpointParseError, InstanceEndpoint};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "RELAY")]
pub struct Config {
    /// Socket the editor instance accepts commands on.
    #[serde(default = "defaults::default_editor_endpoint")]
    #[ortho_config(default = defaults::default_editor_endpoint())]
    pub editor_endpoint: InstanceEndpoint,
    /// Maximum number of sends for a single command.
    #[serde(default = "defaults::default_max_attempts")]
    #[ortho_config(default = defaults::DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    /// Reply deadline for each attempt, in milliseconds.
    #[serde(default = "defaults::default_attempt_timeout_ms")]
    #[ortho_config(default = defaults::DEFAULT_ATTEMPT_TIMEOUT_MS)]
    pub attempt_timeout_ms: u64,
    /// Backoff delay after the first failed attempt, in milliseconds.
    #[serde(default = "defaults::default_retry_base_delay_ms")]
    #[ortho_config(default = defaults::DEFAULT_RETRY_BASE_DELAY_MS)]
    pub retry_base_delay_ms: u64,
    /// Ceiling applied to every backoff delay, in milliseconds.
    #[serde(default = "defaults::default_retry_max_delay_ms")]
    #[ortho_config(default = defaults::DEFAULT_RETRY_MAX_DELAY_MS)]
    pub retry_max_delay_ms: u64,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor_endpoint: default_editor_endpoint(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint of the editor instance.
    #[must_use]
    pub const fn editor_endpoint(&self) -> &InstanceEndpoint {
        &self.editor_endpoint
    }

    /// Number of sends allowed per command; never less than one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Reply deadline for a single attempt.
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Delay after the first failed attempt.
    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Largest delay between two attempts.
    #[must_use]
    pub const fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
