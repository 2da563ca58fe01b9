//! Periodic status logging task.
//!
//! # Usage
//!
//! ```ignore
//! use tramtrack::tracking::spawn_status_logger;
//! use tokio_util::sync::CancellationToken;
//!
//! let cancellation = CancellationToken::new();
//! let handle = spawn_status_logger(
//!     session.status(),
//!     cancellation.clone(),
//!     std::time::Duration::from_secs(20),
//! );
//! ```
//!
//! # Output Format
//!
//! Logs are emitted at DEBUG level with structured fields:
//! - `lat`, `lon` - Latest accepted position in decimal degrees
//! - `x`, `z`, `hdg_deg` - Rendered transform
//! - `phase`, `mode` - Reconciler state
//! - `moving`, `healthy` - Movement and channel health
//! - `building` - Last landmark passed

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::TrackerSnapshot;

/// Default logging interval (20 seconds).
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(20);

/// Spawns a background task that periodically logs the latest snapshot.
///
/// Stops when the cancellation token fires or the session drops its sender.
/// Callers should check `tracing::enabled!(tracing::Level::DEBUG)` first.
pub fn spawn_status_logger(
    status: watch::Receiver<TrackerSnapshot>,
    cancellation: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if status.has_changed().is_err() {
                        tracing::debug!("Status channel closed, logger stopped");
                        break;
                    }
                    log_snapshot(&status.borrow());
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!("Status logger stopped");
                    break;
                }
            }
        }
    })
}

fn log_snapshot(snapshot: &TrackerSnapshot) {
    let status = &snapshot.status;

    match (status.current_point, snapshot.transform) {
        (Some(point), Some(transform)) => {
            tracing::debug!(
                lat = format!("{:.6}", point.latitude),
                lon = format!("{:.6}", point.longitude),
                x = format!("{:.1}", transform.position.x),
                z = format!("{:.1}", transform.position.z),
                hdg_deg = format!("{:.0}", heading_degrees(transform.heading)),
                phase = %status.phase,
                mode = %status.mode,
                moving = status.is_moving,
                healthy = status.connection_healthy,
                building = snapshot.tram.last_building_passed.as_deref().unwrap_or("-"),
                "Tram status"
            );
        }
        _ => {
            tracing::debug!(
                phase = %status.phase,
                mode = %status.mode,
                healthy = status.connection_healthy,
                "Tram status (no position data)"
            );
        }
    }
}

/// Heading in degrees, normalised to [0, 360).
fn heading_degrees(heading: f64) -> f64 {
    heading.to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_degrees_normalised() {
        assert!((heading_degrees(std::f64::consts::PI) - 180.0).abs() < 1e-9);
        assert!((heading_degrees(-std::f64::consts::FRAC_PI_2) - 270.0).abs() < 1e-9);
        assert!((heading_degrees(5.0 * std::f64::consts::PI) - 180.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logger_stops_on_cancel() {
        use crate::tracking::reconciler::{PositionReconciler, ReconcilerConfig};

        let reconciler = PositionReconciler::new(ReconcilerConfig::default());
        let (_tx, rx) = watch::channel(reconciler.snapshot(std::time::Instant::now()));
        let cancellation = CancellationToken::new();
        let handle = spawn_status_logger(rx, cancellation.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(3)).await;
        cancellation.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_logger_stops_when_sender_dropped() {
        use crate::tracking::reconciler::{PositionReconciler, ReconcilerConfig};

        let reconciler = PositionReconciler::new(ReconcilerConfig::default());
        let (tx, rx) = watch::channel(reconciler.snapshot(std::time::Instant::now()));
        drop(tx);
        let handle = spawn_status_logger(rx, CancellationToken::new(), Duration::from_millis(10));
        handle.await.unwrap();
    }
}
