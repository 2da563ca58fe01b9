//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let (center_lat, center_lon) = config
        .tracking
        .center
        .map(|(lat, lon)| (lat.to_string(), lon.to_string()))
        .unwrap_or_default();
    let route = config
        .fallback
        .route
        .iter()
        .map(|(lat, lon)| format!("{},{}", lat, lon))
        .collect::<Vec<_>>()
        .join("; ");
    let landmarks: String = config
        .landmarks
        .iter()
        .map(|l| format!("{} = {},{},{}\n", l.name, l.latitude, l.longitude, l.radius_m))
        .collect();

    format!(
        r#"[server]
; WebSocket address of the location push server (ws:// or wss://)
server_address = {}
; Identifier shown for the tracked tram
tram_id = {}
; Seconds between keepalive pings while connected
keepalive_interval_secs = {}

[reconnect]
; Retry automatically after an unexpected disconnect
reconnect_enabled = {}
; Give up after this many consecutive failed attempts (manual reconnect still works)
max_reconnect_attempts = {}
; Delay before each retry in milliseconds
reconnect_delay_ms = {}
; Bound on a single connect attempt in milliseconds
connect_timeout_ms = {}

[tracking]
; Movement smaller than this on both axes (degrees) is ignored (~0.5m)
change_tolerance_degrees = {}
; Updates older than this (milliseconds) freeze the tram instead of moving it
stale_threshold_ms = {}
; Scene units per degree of latitude/longitude
scale = {}
; Projection origin. Leave empty to use the fallback route centre or the campus default
center_lat = {}
center_lon = {}
; Heading offset in radians for models whose forward axis is not +z
model_heading_offset = {}
; Displacements below this many scene units are treated as GPS noise
min_motion = {}
; Seconds without movement before the tram is reported as stopped
stopped_after_secs = {}

[motion]
; Translation speed in scene units per second
linear_speed = {}
; Rotation speed in radians per second
rotation_speed = {}
; Frame tick in milliseconds (33 = ~30 Hz)
frame_interval_ms = {}

[fallback]
; Walk a static route until the first live update arrives
enabled = {}
; Waypoints as lat,lon separated by semicolons
route = {}
; Seconds between waypoints
interval_secs = {}

[landmarks]
; name = lat,lon[,radius_m] - reported as the last building passed
{}
[logging]
; Log file path (cleared at the start of each session)
file = {}
"#,
        config.server.server_address,
        config.server.tram_id,
        config.server.keepalive_interval_secs,
        config.reconnect.reconnect_enabled,
        config.reconnect.max_reconnect_attempts,
        config.reconnect.reconnect_delay_ms,
        config.reconnect.connect_timeout_ms,
        config.tracking.change_tolerance_degrees,
        config.tracking.stale_threshold_ms,
        config.tracking.scale,
        center_lat,
        center_lon,
        config.tracking.model_heading_offset,
        config.tracking.min_motion,
        config.tracking.stopped_after_secs,
        config.motion.linear_speed,
        config.motion.rotation_speed,
        config.motion.frame_interval_ms,
        config.fallback.enabled,
        route,
        config.fallback.interval_secs,
        landmarks,
        path_to_string(&config.logging.file),
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
