//! Core state types for tram location tracking.
//!
//! This module defines the fundamental types shared by the channel client,
//! the validator and the reconciler:
//!
//! - [`GeoPoint`] - A geographic fix with its measurement time
//! - [`LocationUpdate`] - One inbound message, already parsed
//! - [`UpdateStatus`] - What the server says about the fix
//! - [`ConnectionPhase`] / [`ConnectionState`] - Channel connectivity
//! - [`ReconcilerPhase`] / [`TrackingMode`] - Reconciler state machine
//! - [`ReconcilerStatus`] / [`TramStatus`] - Snapshots for consumers

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::projection::Transform;

/// A geographic fix.
///
/// Latitude/longitude are kept as received; a point built from a malformed
/// message may be out of range. Use [`super::validator::is_valid`] before
/// trusting it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// When the fix was measured. `None` when the server omitted it.
    pub timestamp: Option<DateTime<Utc>>,
}

impl GeoPoint {
    /// Create a point with a measurement time.
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: Some(timestamp),
        }
    }

    /// Create a point stamped with the current wall-clock time.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Utc::now())
    }

    /// Position as (latitude, longitude).
    pub fn lat_lon(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Server-reported status of a location fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStatus {
    /// Live GPS fix from the vehicle.
    Active,
    /// Produced by the server's simulator.
    Simulated,
    /// Missing or unrecognised status string.
    #[default]
    Unknown,
}

impl UpdateStatus {
    /// Parse the wire status string. Unrecognised values map to `Unknown`.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "active" => Self::Active,
            Some(s) if s == "simulated" => Self::Simulated,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Simulated => write!(f, "Simulated"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One inbound location message.
///
/// Constructed per message by the channel client and discarded once the
/// reconciler has folded it into its state.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    /// The newest fix.
    pub current: GeoPoint,

    /// The fix before `current`, if the server sent one.
    pub previous: Option<GeoPoint>,

    /// Server-reported status.
    pub status: UpdateStatus,

    /// Tag naming where the update came from (e.g. "socket", "manual").
    pub source: String,

    /// When the client received the message.
    pub received_at: DateTime<Utc>,
}

impl LocationUpdate {
    /// Source tag for updates parsed from the push channel.
    pub const SOURCE_CHANNEL: &'static str = "channel";

    /// Source tag for manually injected positions.
    pub const SOURCE_MANUAL: &'static str = "manual";

    /// Source tag for points taken from the static fallback route.
    pub const SOURCE_FALLBACK: &'static str = "fallback";

    /// Wrap a single point as an update received now.
    pub fn from_point(current: GeoPoint, source: &str) -> Self {
        Self {
            current,
            previous: None,
            status: UpdateStatus::Unknown,
            source: source.to_string(),
            received_at: Utc::now(),
        }
    }
}

/// Connectivity of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No transport open and none being opened.
    #[default]
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport open and usable.
    Connected,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Connection state owned by the channel client.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConnectionState {
    /// Current phase.
    pub phase: ConnectionPhase,

    /// Reconnect attempts made since the last successful connect.
    pub attempt_count: u32,

    /// When the connection was last lost unexpectedly.
    pub last_loss_at: Option<DateTime<Utc>>,
}

/// Phase of the reconciler state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilerPhase {
    /// No valid position accepted yet.
    #[default]
    Uninitialized,
    /// Holding a position, nothing in flight.
    Tracking,
    /// A transition toward the latest accepted position is running.
    Transitioning,
    /// The last update was too old; transform frozen.
    Stale,
    /// Channel lost; transform frozen at the last known value.
    Disconnected,
}

impl std::fmt::Display for ReconcilerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Tracking => write!(f, "Tracking"),
            Self::Transitioning => write!(f, "Transitioning"),
            Self::Stale => write!(f, "Stale"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Which input drives the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    /// Driven by pushed live updates.
    #[default]
    Realtime,
    /// Driven by stepping through a static route.
    Fallback,
}

impl std::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Realtime => write!(f, "realtime"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Side-effect-free snapshot of the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerStatus {
    /// Latest accepted point.
    pub current_point: Option<GeoPoint>,
    /// Accepted point before `current_point`.
    pub previous_point: Option<GeoPoint>,
    /// True while a transition is in flight.
    pub is_moving: bool,
    /// Channel health as last reported to the reconciler.
    pub connection_healthy: bool,
    /// When the connection was lost, cleared on restore.
    pub last_connection_loss_at: Option<DateTime<Utc>>,
    /// Realtime or fallback.
    pub mode: TrackingMode,
    /// State machine phase.
    pub phase: ReconcilerPhase,
}

/// Coarse running state shown to riders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Moving, or moved recently.
    Running,
    /// Not moved for a while, or no data.
    Stopped,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Latitude/longitude pair as shown to consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Consumer-facing tram status.
#[derive(Debug, Clone, PartialEq)]
pub struct TramStatus {
    /// Identifier of the tracked tram.
    pub tram_id: String,
    /// Running or stopped.
    pub status: RunState,
    /// Latest accepted location.
    pub location: Option<LatLng>,
    /// Name of the last landmark whose radius contained an accepted fix.
    pub last_building_passed: Option<String>,
    /// True while a transition is in flight.
    pub is_moving: bool,
    /// Milliseconds since the tram last moved (or since tracking began).
    pub ms_since_last_movement: u64,
    /// Channel health.
    pub connection_healthy: bool,
}

/// Everything a rendering or UI collaborator needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    /// Reconciler status.
    pub status: ReconcilerStatus,
    /// Rider-facing status.
    pub tram: TramStatus,
    /// Current interpolated transform, `None` before the first fix.
    pub transform: Option<Transform>,
}

/// Clamp a duration to whole milliseconds for display.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
