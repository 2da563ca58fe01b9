//! Push-channel wire protocol.
//!
//! Inbound frames are JSON objects:
//!
//! ```text
//! { "c": { "lat": 13.6, "lon": 100.8, "t": 1700000000000 },
//!   "p": { "lat": 13.6, "lon": 100.79, "t": "2026-02-08T06:50:21Z" },
//!   "s": "active" }
//! ```
//!
//! Coordinates may be numbers or numeric strings, `t` may be epoch
//! milliseconds or an RFC 3339 string. `p` and `s` are optional. A frame
//! carrying `"error"` is a server error report.
//!
//! Outbound frames are `{"event":"request_update"}` and `{"event":"ping"}`.
//!
//! Parsing never checks coordinate ranges; that is the validator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::error::InvalidDataError;
use super::state::{GeoPoint, LocationUpdate, UpdateStatus};
use crate::time::{from_epoch_millis, parse_timestamp};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A location update.
    Location(LocationUpdate),
    /// The server reported an error.
    ServerError(String),
}

/// Frames the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Ask the server for the latest location.
    RequestUpdate,
    /// Keepalive.
    Ping,
}

impl OutboundFrame {
    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }
}

#[derive(Deserialize)]
struct WireFrame {
    c: Option<serde_json::Value>,
    p: Option<serde_json::Value>,
    s: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct WirePoint {
    lat: Option<WireNumber>,
    lon: Option<WireNumber>,
    t: Option<WireNumber>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Number(f64),
    Text(String),
}

/// Decode one inbound text frame.
pub fn parse_frame(text: &str, received_at: DateTime<Utc>) -> Result<InboundFrame, InvalidDataError> {
    let frame: WireFrame =
        serde_json::from_str(text).map_err(|e| InvalidDataError::Malformed(e.to_string()))?;

    if let Some(message) = frame.error {
        return Ok(InboundFrame::ServerError(message));
    }

    let current = frame.c.ok_or(InvalidDataError::MissingField("c"))?;
    let current = parse_point(current)?;

    // A broken previous point does not invalidate the current one.
    let previous = match frame.p {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => match parse_point(value) {
            Ok(point) => Some(point),
            Err(e) => {
                trace!(error = %e, "Ignoring malformed previous point");
                None
            }
        },
    };

    Ok(InboundFrame::Location(LocationUpdate {
        current,
        previous,
        status: UpdateStatus::from_wire(frame.s.as_deref()),
        source: LocationUpdate::SOURCE_CHANNEL.to_string(),
        received_at,
    }))
}

fn parse_point(value: serde_json::Value) -> Result<GeoPoint, InvalidDataError> {
    let point: WirePoint =
        serde_json::from_value(value).map_err(|e| InvalidDataError::Malformed(e.to_string()))?;

    let latitude = coordinate("lat", point.lat)?;
    let longitude = coordinate("lon", point.lon)?;
    let timestamp = match point.t {
        None => None,
        Some(WireNumber::Number(ms)) => Some(
            from_epoch_millis(ms).ok_or_else(|| InvalidDataError::Timestamp(ms.to_string()))?,
        ),
        Some(WireNumber::Text(text)) => {
            Some(parse_timestamp(&text).ok_or(InvalidDataError::Timestamp(text))?)
        }
    };

    Ok(GeoPoint {
        latitude,
        longitude,
        timestamp,
    })
}

fn coordinate(field: &'static str, value: Option<WireNumber>) -> Result<f64, InvalidDataError> {
    let parsed = match value.ok_or(InvalidDataError::MissingField(field))? {
        WireNumber::Number(n) => n,
        WireNumber::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| InvalidDataError::NotANumber { field, value: text.clone() })?,
    };

    if !parsed.is_finite() {
        return Err(InvalidDataError::NotANumber {
            field,
            value: parsed.to_string(),
        });
    }
    Ok(parsed)
}
