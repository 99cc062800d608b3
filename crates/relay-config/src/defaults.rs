use crate::endpoint::InstanceEndpoint;
use crate::logging::LogFormat;

/// Default TCP port the editor plugin listens on.
pub const DEFAULT_EDITOR_PORT: u16 = 6400;

/// Default host for the editor command socket.
pub const DEFAULT_EDITOR_HOST: &str = "127.0.0.1";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Number of sends attempted before a transient failure is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Per-attempt reply deadline in milliseconds.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 10_000;

/// Delay after the first failed attempt; doubles per attempt.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;

/// Upper bound for a single backoff delay.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2_000;

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Endpoint used when no editor endpoint is configured.
#[must_use]
pub fn default_editor_endpoint() -> InstanceEndpoint {
    InstanceEndpoint::tcp(DEFAULT_EDITOR_HOST, DEFAULT_EDITOR_PORT)
}

pub(crate) const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

pub(crate) const fn default_attempt_timeout_ms() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT_MS
}

pub(crate) const fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}

pub(crate) const fn default_retry_max_delay_ms() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_MS
}
