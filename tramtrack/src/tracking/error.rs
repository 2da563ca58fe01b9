//! Error types for location tracking.
//!
//! None of these escape the client or reconciler as failures of normal
//! operation. They are delivered to `on_error` observers or reflected in the
//! status snapshot.

use thiserror::Error;

/// A location payload or coordinate that cannot be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidDataError {
    /// Payload is not a JSON object we understand.
    #[error("Malformed location payload: {0}")]
    Malformed(String),

    /// A required field is absent.
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// A coordinate is not a finite number.
    #[error("Field '{field}' is not a finite number: {value}")]
    NotANumber { field: &'static str, value: String },

    /// A coordinate is outside its valid range.
    #[error("Field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    /// Timestamp present but unparseable.
    #[error("Failed to parse timestamp: {0}")]
    Timestamp(String),
}

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Opening the transport failed.
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Opening the transport did not finish in time.
    #[error("Connection to {address} timed out after {timeout_ms}ms")]
    ConnectTimeout { address: String, timeout_ms: u64 },

    /// Sending a frame failed.
    #[error("Failed to send frame: {0}")]
    SendFailed(String),

    /// Operation needs an open transport.
    #[error("Transport is not open")]
    NotOpen,

    /// The connection dropped unexpectedly.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Non-fatal error reported by the transport.
    #[error("Transport error: {0}")]
    Protocol(String),

    /// The server sent an error frame.
    #[error("Server error: {0}")]
    Server(String),
}

/// Everything the tracking core can report through its error channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// Malformed or out-of-range data; the update was dropped.
    #[error(transparent)]
    InvalidData(#[from] InvalidDataError),

    /// Update older than the freshness bound; state frozen.
    #[error("Location data is stale (age: {age_ms}ms, max: {max_age_ms}ms)")]
    StaleData { age_ms: u64, max_age_ms: u64 },

    /// Connection-level failure; reconnect policy applies.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reconnect ceiling reached; a manual connect is required.
    #[error("Gave up reconnecting after {attempts} attempts")]
    ExhaustedRetries { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_data_converts_to_tracking_error() {
        let err: TrackingError = InvalidDataError::MissingField("c").into();
        assert!(matches!(err, TrackingError::InvalidData(_)));
        assert_eq!(err.to_string(), "Missing required field 'c'");
    }

    #[test]
    fn test_exhausted_retries_message() {
        let err = TrackingError::ExhaustedRetries { attempts: 5 };
        assert_eq!(err.to_string(), "Gave up reconnecting after 5 attempts");
    }
}
