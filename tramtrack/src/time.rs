//! Time-related utility functions.
//!
//! Location fixes arrive stamped either as epoch milliseconds or as RFC 3339
//! strings. These helpers turn both into `DateTime<Utc>`.

use chrono::{DateTime, Utc};

/// Convert epoch milliseconds to a UTC timestamp.
///
/// Fractional milliseconds are truncated. Returns `None` for non-finite input
/// or values outside chrono's representable range.
///
/// # Example
///
/// ```
/// use tramtrack::time::from_epoch_millis;
///
/// let ts = from_epoch_millis(1_700_000_000_000.0).unwrap();
/// assert_eq!(ts.timestamp(), 1_700_000_000);
/// ```
pub fn from_epoch_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Parse a textual timestamp: RFC 3339 first, then integer epoch milliseconds.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    text.parse::<f64>().ok().and_then(from_epoch_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_epoch_millis_roundtrip() {
        let now = Utc::now();
        let ts = from_epoch_millis(now.timestamp_millis() as f64).unwrap();
        assert_eq!(ts.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn from_epoch_millis_rejects_non_finite() {
        assert!(from_epoch_millis(f64::NAN).is_none());
        assert!(from_epoch_millis(f64::INFINITY).is_none());
    }

    #[test]
    fn parse_timestamp_rfc3339() {
        let ts = parse_timestamp("2026-02-08T06:50:21.380Z").unwrap();
        assert_eq!(ts.timestamp(), 1_770_533_421);
    }

    #[test]
    fn parse_timestamp_millis_string() {
        let ts = parse_timestamp("1700000000000").unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parse_timestamp_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
