//! Update validation - range checks, change detection and staleness.
//!
//! The free functions are pure. [`UpdateValidator`] bundles them with the
//! configured thresholds so the reconciler carries a single value.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::state::GeoPoint;

/// Default change tolerance in degrees (~0.5m).
pub const DEFAULT_CHANGE_TOLERANCE_DEGREES: f64 = 5e-6;

/// Default maximum age before an update is considered stale.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(60);

/// True iff both coordinates are finite and within their valid ranges.
pub fn is_valid(point: &GeoPoint) -> bool {
    point.latitude.is_finite()
        && point.longitude.is_finite()
        && (-90.0..=90.0).contains(&point.latitude)
        && (-180.0..=180.0).contains(&point.longitude)
}

/// True if `old` is absent or either coordinate moved by more than `tolerance_degrees`.
///
/// This is the only gate deciding whether a transition is worth starting.
pub fn has_changed(new: &GeoPoint, old: Option<&GeoPoint>, tolerance_degrees: f64) -> bool {
    let Some(old) = old else {
        return true;
    };

    (new.latitude - old.latitude).abs() > tolerance_degrees
        || (new.longitude - old.longitude).abs() > tolerance_degrees
}

/// True if `timestamp` is absent or older than `max_age` relative to now.
pub fn is_stale(timestamp: Option<DateTime<Utc>>, max_age: Duration) -> bool {
    is_stale_at(timestamp, max_age, Utc::now())
}

/// [`is_stale`] against an explicit clock reading.
///
/// Timestamps in the future are treated as fresh.
pub fn is_stale_at(timestamp: Option<DateTime<Utc>>, max_age: Duration, now: DateTime<Utc>) -> bool {
    match timestamp {
        None => true,
        Some(ts) => age_of(ts, now) > max_age,
    }
}

/// Age of a timestamp relative to `now`, zero for future timestamps.
pub fn age_of(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(timestamp)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Validator carrying the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateValidator {
    /// Per-axis change tolerance in degrees.
    pub change_tolerance_degrees: f64,

    /// Maximum accepted update age.
    pub stale_threshold: Duration,
}

impl Default for UpdateValidator {
    fn default() -> Self {
        Self {
            change_tolerance_degrees: DEFAULT_CHANGE_TOLERANCE_DEGREES,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
        }
    }
}

impl UpdateValidator {
    /// Create a validator with explicit thresholds.
    pub fn new(change_tolerance_degrees: f64, stale_threshold: Duration) -> Self {
        Self {
            change_tolerance_degrees,
            stale_threshold,
        }
    }

    /// See [`is_valid`].
    pub fn is_valid(&self, point: &GeoPoint) -> bool {
        is_valid(point)
    }

    /// [`has_changed`] with the configured tolerance.
    pub fn has_changed(&self, new: &GeoPoint, old: Option<&GeoPoint>) -> bool {
        has_changed(new, old, self.change_tolerance_degrees)
    }

    /// [`is_stale`] with the configured threshold.
    pub fn is_stale(&self, point: &GeoPoint) -> bool {
        is_stale(point.timestamp, self.stale_threshold)
    }
}
