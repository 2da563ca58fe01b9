//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::file::config_directory;
use super::settings::*;
use crate::tracking::channel::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_SERVER_ADDRESS};
use crate::tracking::projection::DEFAULT_SCALE;
use crate::tracking::reconciler::{DEFAULT_LINEAR_SPEED, DEFAULT_MIN_MOTION, DEFAULT_ROTATION_SPEED};
use crate::tracking::validator::DEFAULT_CHANGE_TOLERANCE_DEGREES;

/// Default tram identifier.
pub const DEFAULT_TRAM_ID: &str = "tram-1";

/// Default keepalive interval (seconds).
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 25;

/// Default reconnect delay (ms).
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// Default connect timeout (ms).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default staleness threshold (ms).
pub const DEFAULT_STALE_THRESHOLD_MS: u64 = 60_000;

/// Default seconds without movement before reporting stopped.
pub const DEFAULT_STOPPED_AFTER_SECS: u64 = 60;

/// Default frame tick (ms), roughly 30 Hz.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

/// Default fallback step interval (seconds).
pub const DEFAULT_FALLBACK_INTERVAL_SECS: u64 = 5;

/// Default log file name.
pub const DEFAULT_LOG_FILE_NAME: &str = "tramtrack.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = config_directory();

        Self {
            server: ServerSettings {
                server_address: DEFAULT_SERVER_ADDRESS.to_string(),
                tram_id: DEFAULT_TRAM_ID.to_string(),
                keepalive_interval_secs: DEFAULT_KEEPALIVE_INTERVAL_SECS,
            },
            reconnect: ReconnectSettings {
                reconnect_enabled: true,
                max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
                reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
                connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            },
            tracking: TrackingSettings {
                change_tolerance_degrees: DEFAULT_CHANGE_TOLERANCE_DEGREES,
                stale_threshold_ms: DEFAULT_STALE_THRESHOLD_MS,
                scale: DEFAULT_SCALE,
                center: None,
                model_heading_offset: 0.0,
                min_motion: DEFAULT_MIN_MOTION,
                stopped_after_secs: DEFAULT_STOPPED_AFTER_SECS,
            },
            motion: MotionSettings {
                linear_speed: DEFAULT_LINEAR_SPEED,
                rotation_speed: DEFAULT_ROTATION_SPEED,
                frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            },
            fallback: FallbackSettings {
                enabled: false,
                route: Vec::new(),
                interval_secs: DEFAULT_FALLBACK_INTERVAL_SECS,
            },
            landmarks: Vec::new(),
            logging: LoggingSettings {
                file: config_dir.join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
