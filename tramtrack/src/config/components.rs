//! Conversion from [`ConfigFile`] into the component configurations.

use std::time::Duration;

use super::settings::ConfigFile;
use crate::tracking::{ChannelConfig, ReconcilerConfig, SessionConfig, UpdateValidator};

impl ConfigFile {
    /// Push channel settings.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            server_address: self.server.server_address.clone(),
            reconnect_enabled: self.reconnect.reconnect_enabled,
            max_reconnect_attempts: self.reconnect.max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.reconnect.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.reconnect.connect_timeout_ms),
            keepalive_interval: Duration::from_secs(self.server.keepalive_interval_secs),
        }
    }

    /// Reconciler settings. The fallback route is only passed on when enabled.
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            tram_id: self.server.tram_id.clone(),
            validator: UpdateValidator::new(
                self.tracking.change_tolerance_degrees,
                Duration::from_millis(self.tracking.stale_threshold_ms),
            ),
            linear_speed: self.motion.linear_speed,
            rotation_speed: self.motion.rotation_speed,
            scale: self.tracking.scale,
            center: self.tracking.center,
            model_heading_offset: self.tracking.model_heading_offset,
            min_motion: self.tracking.min_motion,
            stopped_after: Duration::from_secs(self.tracking.stopped_after_secs),
            fallback_route: if self.fallback.enabled {
                self.fallback.route.clone()
            } else {
                Vec::new()
            },
            landmarks: self.landmarks.clone(),
        }
    }

    /// Session driver settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            frame_interval: Duration::from_millis(self.motion.frame_interval_ms),
            fallback_interval: Duration::from_secs(self.fallback.interval_secs),
            connect_on_start: true,
        }
    }
}
