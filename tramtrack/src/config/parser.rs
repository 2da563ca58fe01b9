//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::tracking::landmarks::DEFAULT_LANDMARK_RADIUS_M;
use crate::tracking::Landmark;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("server_address") {
            let v = v.trim();
            if !(v.starts_with("ws://") || v.starts_with("wss://")) {
                return Err(invalid("server", "server_address", v, "must start with ws:// or wss://"));
            }
            config.server.server_address = v.to_string();
        }
        if let Some(v) = section.get("tram_id") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("server", "tram_id", v, "must not be empty"));
            }
            config.server.tram_id = v.to_string();
        }
        if let Some(v) = section.get("keepalive_interval_secs") {
            config.server.keepalive_interval_secs =
                positive("server", "keepalive_interval_secs", v, "must be a positive integer (seconds)")?;
        }
    }

    // [reconnect] section
    if let Some(section) = ini.section(Some("reconnect")) {
        if let Some(v) = section.get("reconnect_enabled") {
            config.reconnect.reconnect_enabled = parse_bool(v);
        }
        if let Some(v) = section.get("max_reconnect_attempts") {
            config.reconnect.max_reconnect_attempts =
                number("reconnect", "max_reconnect_attempts", v, "must be a non-negative integer")?;
        }
        if let Some(v) = section.get("reconnect_delay_ms") {
            config.reconnect.reconnect_delay_ms =
                number("reconnect", "reconnect_delay_ms", v, "must be a non-negative integer (milliseconds)")?;
        }
        if let Some(v) = section.get("connect_timeout_ms") {
            config.reconnect.connect_timeout_ms =
                positive("reconnect", "connect_timeout_ms", v, "must be a positive integer (milliseconds)")?;
        }
    }

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("change_tolerance_degrees") {
            config.tracking.change_tolerance_degrees =
                non_negative_f64("tracking", "change_tolerance_degrees", v)?;
        }
        if let Some(v) = section.get("stale_threshold_ms") {
            config.tracking.stale_threshold_ms =
                positive("tracking", "stale_threshold_ms", v, "must be a positive integer (milliseconds)")?;
        }
        if let Some(v) = section.get("scale") {
            config.tracking.scale = positive_f64("tracking", "scale", v)?;
        }
        if let Some(v) = section.get("model_heading_offset") {
            config.tracking.model_heading_offset = finite_f64("tracking", "model_heading_offset", v)?;
        }
        if let Some(v) = section.get("min_motion") {
            config.tracking.min_motion = non_negative_f64("tracking", "min_motion", v)?;
        }
        if let Some(v) = section.get("stopped_after_secs") {
            config.tracking.stopped_after_secs =
                number("tracking", "stopped_after_secs", v, "must be a non-negative integer (seconds)")?;
        }

        let lat = section.get("center_lat").filter(|v| !v.trim().is_empty());
        let lon = section.get("center_lon").filter(|v| !v.trim().is_empty());
        config.tracking.center = match (lat, lon) {
            (None, None) => None,
            (Some(lat), Some(lon)) => Some((
                latitude("tracking", "center_lat", lat)?,
                longitude("tracking", "center_lon", lon)?,
            )),
            (Some(lat), None) => {
                return Err(invalid("tracking", "center_lat", lat, "center_lon must also be set"));
            }
            (None, Some(lon)) => {
                return Err(invalid("tracking", "center_lon", lon, "center_lat must also be set"));
            }
        };
    }

    // [motion] section
    if let Some(section) = ini.section(Some("motion")) {
        if let Some(v) = section.get("linear_speed") {
            config.motion.linear_speed = positive_f64("motion", "linear_speed", v)?;
        }
        if let Some(v) = section.get("rotation_speed") {
            config.motion.rotation_speed = positive_f64("motion", "rotation_speed", v)?;
        }
        if let Some(v) = section.get("frame_interval_ms") {
            config.motion.frame_interval_ms =
                positive("motion", "frame_interval_ms", v, "must be a positive integer (milliseconds)")?;
        }
    }

    // [fallback] section
    if let Some(section) = ini.section(Some("fallback")) {
        if let Some(v) = section.get("enabled") {
            config.fallback.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("route") {
            config.fallback.route = parse_route(v)?;
        }
        if let Some(v) = section.get("interval_secs") {
            config.fallback.interval_secs =
                positive("fallback", "interval_secs", v, "must be a positive integer (seconds)")?;
        }
        if config.fallback.enabled && config.fallback.route.is_empty() {
            return Err(invalid("fallback", "route", "", "a route is required when fallback is enabled"));
        }
    }

    // [landmarks] section: `name = lat,lon[,radius_m]`
    if let Some(section) = ini.section(Some("landmarks")) {
        for (name, value) in section.iter() {
            config.landmarks.push(parse_landmark(name, value)?);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parse `lat,lon; lat,lon; ...` into waypoints.
pub(super) fn parse_route(value: &str) -> Result<Vec<(f64, f64)>, ConfigFileError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|point| !point.is_empty())
        .map(|point| {
            let (lat, lon) = point.split_once(',').ok_or_else(|| {
                invalid("fallback", "route", point, "each waypoint must be 'lat,lon'")
            })?;
            Ok((
                latitude("fallback", "route", lat)?,
                longitude("fallback", "route", lon)?,
            ))
        })
        .collect()
}

/// Parse `lat,lon[,radius_m]` for the landmark `name`.
fn parse_landmark(name: &str, value: &str) -> Result<Landmark, ConfigFileError> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let (lat, lon, radius) = match parts.as_slice() {
        [lat, lon] => (*lat, *lon, None),
        [lat, lon, radius] => (*lat, *lon, Some(*radius)),
        _ => {
            return Err(invalid("landmarks", name, value, "expected 'lat,lon' or 'lat,lon,radius_m'"));
        }
    };

    let radius_m = match radius {
        Some(r) => positive_f64("landmarks", name, r)?,
        None => DEFAULT_LANDMARK_RADIUS_M,
    };

    Ok(Landmark::new(
        name.trim(),
        latitude("landmarks", name, lat)?,
        longitude("landmarks", name, lon)?,
        radius_m,
    ))
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn number<T: FromStr>(section: &str, key: &str, value: &str, reason: &str) -> Result<T, ConfigFileError> {
    value.trim().parse().map_err(|_| invalid(section, key, value, reason))
}

fn positive(section: &str, key: &str, value: &str, reason: &str) -> Result<u64, ConfigFileError> {
    match number::<u64>(section, key, value, reason)? {
        0 => Err(invalid(section, key, value, reason)),
        n => Ok(n),
    }
}

fn finite_f64(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let n: f64 = number(section, key, value, "must be a number")?;
    if !n.is_finite() {
        return Err(invalid(section, key, value, "must be a finite number"));
    }
    Ok(n)
}

fn positive_f64(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let n = finite_f64(section, key, value)?;
    if n <= 0.0 {
        return Err(invalid(section, key, value, "must be greater than zero"));
    }
    Ok(n)
}

fn non_negative_f64(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let n = finite_f64(section, key, value)?;
    if n < 0.0 {
        return Err(invalid(section, key, value, "must not be negative"));
    }
    Ok(n)
}

fn latitude(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let n = finite_f64(section, key, value)?;
    if !(-90.0..=90.0).contains(&n) {
        return Err(invalid(section, key, value, "latitude must be within [-90, 90]"));
    }
    Ok(n)
}

fn longitude(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let n = finite_f64(section, key, value)?;
    if !(-180.0..=180.0).contains(&n) {
        return Err(invalid(section, key, value, "longitude must be within [-180, 180]"));
    }
    Ok(n)
}
