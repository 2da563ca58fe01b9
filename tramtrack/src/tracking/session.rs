//! Tracking session - the single task that drives client and reconciler.
//!
//! # Design
//!
//! - `new()` wires the client's observers to the shared reconciler
//! - `start()` spawns `run()` on the runtime
//! - `run()` is one `tokio::select!` loop over transport events, the retry
//!   deadline, keepalive, the frame tick, the fallback tick and cancellation
//! - After every wake-up, queued reconciler actions are executed and a
//!   [`TrackerSnapshot`] is published on a `watch` channel
//!
//! Everything touches the client and reconciler from this one task. The
//! reconciler sits behind a mutex only so observer closures can reach it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::channel::{ChannelClient, Transport};
use super::error::TrackingError;
use super::events::Subscription;
use super::reconciler::{PositionReconciler, ReconcilerAction, UpdateOutcome};
use super::state::{TrackerSnapshot, TrackingMode};

/// Default frame tick (~30 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Default interval between fallback route steps.
pub const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of the error broadcast channel.
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Reconciler shared between the session loop and observer closures.
pub type SharedReconciler = Arc<Mutex<PositionReconciler>>;

/// Configuration for [`TrackingSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How often transitions are sampled and snapshots published.
    pub frame_interval: Duration,

    /// How often the fallback route advances.
    pub fallback_interval: Duration,

    /// Open the channel when the session starts.
    pub connect_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            fallback_interval: DEFAULT_FALLBACK_INTERVAL,
            connect_on_start: true,
        }
    }
}

/// One tracked tram: client, reconciler and timers on a single task.
pub struct TrackingSession<T: Transport> {
    client: ChannelClient<T>,
    reconciler: SharedReconciler,
    config: SessionConfig,
    status_tx: watch::Sender<TrackerSnapshot>,
    error_tx: broadcast::Sender<TrackingError>,
    subscriptions: Vec<Subscription>,
}

impl<T: Transport + 'static> TrackingSession<T> {
    /// Create a session and subscribe the reconciler to the client.
    pub fn new(mut client: ChannelClient<T>, reconciler: PositionReconciler, config: SessionConfig) -> Self {
        let initial = reconciler.snapshot(now());
        let max_age = reconciler.config().validator.stale_threshold;
        let reconciler = Arc::new(Mutex::new(reconciler));
        let (status_tx, _) = watch::channel(initial);
        let (error_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let on_update = reconciler.clone();
        let on_connection = reconciler.clone();
        let update_errors = error_tx.clone();
        let errors = error_tx.clone();
        let subscriptions = vec![
            client.on_update(move |update| {
                let outcome = on_update.lock().handle_update(update, now());
                if let Some(error) = outcome_error(&outcome, max_age) {
                    let _ = update_errors.send(error);
                }
            }),
            client.on_connection_change(move |change| {
                on_connection
                    .lock()
                    .handle_connection_change(change.connected, change.healthy, now());
            }),
            client.on_error(move |error| {
                // No receivers is fine.
                let _ = errors.send(error.clone());
            }),
        ];

        Self {
            client,
            reconciler,
            config,
            status_tx,
            error_tx,
            subscriptions,
        }
    }

    /// Receiver for published snapshots.
    pub fn status(&self) -> watch::Receiver<TrackerSnapshot> {
        self.status_tx.subscribe()
    }

    /// Receiver for errors reported by the client.
    pub fn errors(&self) -> broadcast::Receiver<TrackingError> {
        self.error_tx.subscribe()
    }

    /// Handle to the reconciler, e.g. for manual injection.
    pub fn reconciler(&self) -> SharedReconciler {
        self.reconciler.clone()
    }

    /// Spawn the session loop.
    pub fn start(self, cancellation: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(cancellation).await;
        })
    }

    /// Run until cancelled, then dispose.
    pub async fn run(mut self, cancellation: CancellationToken) {
        let keepalive_interval = self.client.config().keepalive_interval;
        let mut fallback_active = self.reconciler.lock().mode() == TrackingMode::Fallback;

        info!(
            address = %self.client.config().server_address,
            connect = self.config.connect_on_start,
            fallback = fallback_active,
            frame_ms = self.config.frame_interval.as_millis() as u64,
            "Tracking session started"
        );

        if self.config.connect_on_start {
            self.client.connect().await;
            self.run_actions().await;
            self.publish();
        }

        let mut frame = tokio::time::interval(self.config.frame_interval);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut keepalive =
            tokio::time::interval_at(Instant::now() + keepalive_interval, keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut fallback = tokio::time::interval(self.config.fallback_interval);

        loop {
            let retry_at = self.client.retry_deadline();

            tokio::select! {
                _ = cancellation.cancelled() => break,
                event = self.client.next_event() => {
                    self.client.handle_transport_event(event);
                }
                _ = sleep_until_opt(retry_at), if retry_at.is_some() => {
                    self.client.retry_now().await;
                }
                _ = keepalive.tick() => {
                    self.client.ping().await;
                }
                _ = frame.tick() => {
                    self.reconciler.lock().tick(now());
                }
                _ = fallback.tick(), if fallback_active => {
                    let outcome = self.reconciler.lock().advance_fallback(now());
                    match outcome {
                        Some(outcome) => debug!(outcome = ?outcome, "Fallback step"),
                        None => {
                            debug!("Fallback route no longer active");
                            fallback_active = false;
                        }
                    }
                }
            }

            self.run_actions().await;
            self.publish();
        }

        self.dispose().await;
    }

    async fn run_actions(&mut self) {
        let actions = self.reconciler.lock().take_actions();
        for action in actions {
            match action {
                ReconcilerAction::RequestUpdate => self.client.request_update().await,
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.reconciler.lock().snapshot(now());
        self.status_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Cancel transitions, drop observers, close the channel.
    async fn dispose(&mut self) {
        self.reconciler.lock().dispose(now());
        for subscription in self.subscriptions.drain(..) {
            self.client.unsubscribe(subscription);
        }
        self.client.disconnect().await;
        self.publish();
        info!("Tracking session stopped");
    }
}

/// Rejected updates that consumers should hear about.
fn outcome_error(outcome: &UpdateOutcome, max_age: Duration) -> Option<TrackingError> {
    match outcome {
        UpdateOutcome::Stale { age: Some(age) } => Some(TrackingError::StaleData {
            age_ms: age.as_millis() as u64,
            max_age_ms: max_age.as_millis() as u64,
        }),
        UpdateOutcome::Invalid(e) => Some(e.clone().into()),
        _ => None,
    }
}

/// Current time on the runtime clock, as a std instant.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::channel::{ChannelConfig, MockTransport};
    use crate::tracking::error::InvalidDataError;
    use crate::tracking::reconciler::ReconcilerConfig;

    #[test]
    fn test_outcome_error_reports_rejections() {
        let max_age = Duration::from_secs(60);
        let stale = UpdateOutcome::Stale {
            age: Some(Duration::from_secs(90)),
        };
        assert_eq!(
            outcome_error(&stale, max_age),
            Some(TrackingError::StaleData {
                age_ms: 90_000,
                max_age_ms: 60_000
            })
        );
        assert!(matches!(
            outcome_error(&UpdateOutcome::Invalid(InvalidDataError::MissingField("c")), max_age),
            Some(TrackingError::InvalidData(_))
        ));
        assert_eq!(outcome_error(&UpdateOutcome::Unchanged, max_age), None);
        assert_eq!(outcome_error(&UpdateOutcome::Stale { age: None }, max_age), None);
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_uninitialized() {
        let (transport, _remote) = MockTransport::pair();
        let client = ChannelClient::new(ChannelConfig::default(), transport);
        let session = TrackingSession::new(
            client,
            PositionReconciler::new(ReconcilerConfig::default()),
            SessionConfig::default(),
        );

        let snapshot = session.status().borrow().clone();
        assert!(snapshot.transform.is_none());
        assert!(snapshot.status.current_point.is_none());
        assert!(!snapshot.tram.connection_healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_connect_disposes() {
        let (transport, remote) = MockTransport::pair();
        let client = ChannelClient::new(ChannelConfig::default(), transport);
        let session = TrackingSession::new(
            client,
            PositionReconciler::new(ReconcilerConfig::default()),
            SessionConfig {
                connect_on_start: false,
                ..Default::default()
            },
        );
        let reconciler = session.reconciler();
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        session.start(cancellation).await.unwrap();

        assert!(reconciler.lock().is_disposed());
        assert_eq!(remote.open_count(), 0);
    }
}
