//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::tracking::Landmark;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Push server settings
    pub server: ServerSettings,
    /// Reconnect policy
    pub reconnect: ReconnectSettings,
    /// Validation and projection settings
    pub tracking: TrackingSettings,
    /// Transition speeds
    pub motion: MotionSettings,
    /// Static fallback route
    pub fallback: FallbackSettings,
    /// Named landmarks, in file order
    pub landmarks: Vec<Landmark>,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Push server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// WebSocket address of the location server
    pub server_address: String,
    /// Identifier reported for the tracked tram
    pub tram_id: String,
    /// Seconds between keepalive pings
    pub keepalive_interval_secs: u64,
}

/// Reconnect policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectSettings {
    /// Retry after unexpected disconnects
    pub reconnect_enabled: bool,
    /// Retry ceiling
    pub max_reconnect_attempts: u32,
    /// Delay before each retry (ms)
    pub reconnect_delay_ms: u64,
    /// Bound on a single connect attempt (ms)
    pub connect_timeout_ms: u64,
}

/// Validation and projection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    /// Per-axis change tolerance in degrees
    pub change_tolerance_degrees: f64,
    /// Maximum data age before an update is stale (ms)
    pub stale_threshold_ms: u64,
    /// Scene units per degree
    pub scale: f64,
    /// Explicit projection origin as (lat, lon)
    pub center: Option<(f64, f64)>,
    /// Heading offset for the model's forward axis (radians)
    pub model_heading_offset: f64,
    /// Displacements below this many scene units are ignored
    pub min_motion: f64,
    /// Seconds without movement before the tram reads as stopped
    pub stopped_after_secs: u64,
}

/// Transition speed configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSettings {
    /// Scene units per second
    pub linear_speed: f64,
    /// Radians per second
    pub rotation_speed: f64,
    /// Frame tick interval (ms)
    pub frame_interval_ms: u64,
}

/// Fallback route configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackSettings {
    /// Walk the route until live data arrives
    pub enabled: bool,
    /// Ordered (lat, lon) waypoints
    pub route: Vec<(f64, f64)>,
    /// Seconds between route steps
    pub interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
