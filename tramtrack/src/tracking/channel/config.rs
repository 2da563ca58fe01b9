//! Configuration for the push channel client.

use std::time::Duration;

/// Default WebSocket endpoint of the location server.
pub const DEFAULT_SERVER_ADDRESS: &str = "ws://localhost:8080/location";

/// Default reconnect ceiling.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default bound on opening the transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default keepalive interval.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Delay before the single retry that follows a server-initiated close.
pub const SERVER_CLOSE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Configuration for [`super::ChannelClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Address of the push server.
    pub server_address: String,

    /// Whether unexpected disconnects are retried.
    pub reconnect_enabled: bool,

    /// Retry ceiling before giving up.
    pub max_reconnect_attempts: u32,

    /// Delay before each retry.
    pub reconnect_delay: Duration,

    /// Bound on a single open attempt.
    pub connect_timeout: Duration,

    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
}

impl ChannelConfig {
    /// Default config pointed at `server_address`.
    pub fn for_address(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            ..Default::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            reconnect_enabled: true,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}
