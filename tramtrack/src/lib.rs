//! tramtrack - real-time tram location reconciliation for the campus map.
//!
//! This library turns a stream of pushed GPS fixes into a single smoothly
//! animated tram position, surviving jitter, stale data and dropped
//! connections.
//!
//! # High-Level API
//!
//! ```ignore
//! use tramtrack::config::ConfigFile;
//! use tramtrack::tracking::{ChannelClient, PositionReconciler, TrackingSession, WebSocketTransport};
//!
//! let config = ConfigFile::load()?;
//! let client = ChannelClient::new(config.channel_config(), WebSocketTransport::new());
//! let reconciler = PositionReconciler::new(config.reconciler_config());
//! let session = TrackingSession::new(client, reconciler, config.session_config());
//! let status = session.status();
//! let handle = session.start(cancellation.clone());
//! ```

pub mod config;
pub mod logging;
pub mod time;
pub mod tracking;

/// Version of the tramtrack library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
