//! Device endpoint configuration

use std::time::Duration;

use matrix_protocol::DEFAULT_TCP_PORT;
use serde::{Deserialize, Serialize};

/// Default status poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Shortest allowed poll interval
pub const MIN_POLL_INTERVAL_MS: u64 = 300;
/// Longest allowed poll interval
pub const MAX_POLL_INTERVAL_MS: u64 = 30_000;
/// Default delay before the transport retries a failed connection
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;

/// Where the matrix lives and how often to poll it
///
/// Fields missing from persisted configuration fall back to their defaults.
/// An empty `host` is not an error: the bridge simply never connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceEndpoint {
    /// Hostname or IP address of the matrix
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Status poll interval in milliseconds (clamped when used)
    pub poll_interval_ms: u64,
    /// Delay before the transport retries after a failure (0 = never retry)
    pub reconnect_delay_ms: u64,
}

impl Default for DeviceEndpoint {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_TCP_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl DeviceEndpoint {
    /// Create an endpoint with default polling and reconnect settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the poll interval
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the reconnect delay (0 disables reconnecting)
    #[must_use]
    pub fn with_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay_ms = ms;
        self
    }

    /// Whether a host is configured at all
    pub fn has_host(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// `host:port` string suitable for connecting
    pub fn address(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port)
    }

    /// Poll interval clamped to the supported range
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }

    /// Reconnect delay, or `None` if the transport should not retry
    pub fn reconnect_delay(&self) -> Option<Duration> {
        (self.reconnect_delay_ms > 0).then(|| Duration::from_millis(self.reconnect_delay_ms))
    }
}
