//! Channel client - the push connection and its reconnect policy.
//!
//! The client owns the transport and the [`ConnectionState`]. It decodes
//! inbound frames and hands them to observers; it never interprets positions.
//!
//! # Reconnect policy
//!
//! - Unexpected loss or a failed open consumes one attempt and schedules a
//!   retry after `reconnect_delay`, up to `max_reconnect_attempts`. At the
//!   ceiling the client stops and reports [`TrackingError::ExhaustedRetries`].
//! - A clean server close schedules a single retry after
//!   [`SERVER_CLOSE_RETRY_DELAY`] without consuming an attempt.
//! - The retry is only a deadline. The session sleeps until
//!   [`ChannelClient::retry_deadline`] and then calls
//!   [`ChannelClient::retry_now`].

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::config::{ChannelConfig, SERVER_CLOSE_RETRY_DELAY};
use super::transport::{Transport, TransportEvent};
use crate::tracking::error::{TrackingError, TransportError};
use crate::tracking::events::{ConnectionChange, EventKind, EventRegistry, Subscription};
use crate::tracking::protocol::{parse_frame, InboundFrame, OutboundFrame};
use crate::tracking::state::{ConnectionPhase, ConnectionState, LocationUpdate};

/// Client for the location push channel.
pub struct ChannelClient<T: Transport> {
    config: ChannelConfig,
    transport: T,
    state: ConnectionState,
    retry_at: Option<Instant>,
    exhausted: bool,
    update_observers: EventRegistry<LocationUpdate>,
    connection_observers: EventRegistry<ConnectionChange>,
    error_observers: EventRegistry<TrackingError>,
}

impl<T: Transport> ChannelClient<T> {
    pub fn new(config: ChannelConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: ConnectionState::default(),
            retry_at: None,
            exhausted: false,
            update_observers: EventRegistry::new(),
            connection_observers: EventRegistry::new(),
            error_observers: EventRegistry::new(),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Transport open and phase connected.
    pub fn is_healthy(&self) -> bool {
        self.transport.is_open() && self.state.phase == ConnectionPhase::Connected
    }

    /// True once the reconnect ceiling was hit and no manual connect followed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// When the next scheduled retry is due, if any.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Open the channel. No-op when already connected or connecting.
    ///
    /// Failures are reported to error observers and fed into the reconnect
    /// policy rather than returned.
    pub async fn connect(&mut self) {
        if self.state.phase != ConnectionPhase::Disconnected {
            debug!(phase = %self.state.phase, "Connect requested while not disconnected, ignoring");
            return;
        }

        if self.exhausted {
            info!("Manual connect after exhausted retries, resetting reconnect policy");
            self.exhausted = false;
            self.state.attempt_count = 0;
        }

        self.open_transport().await;
    }

    /// Fire the scheduled retry.
    pub async fn retry_now(&mut self) {
        self.retry_at = None;
        if self.state.phase != ConnectionPhase::Disconnected {
            return;
        }
        debug!(attempt = self.state.attempt_count, "Retrying connection");
        self.open_transport().await;
    }

    /// Close the channel and cancel any scheduled retry.
    pub async fn disconnect(&mut self) {
        self.retry_at = None;
        let was_connected = self.state.phase == ConnectionPhase::Connected;

        if self.transport.is_open() {
            self.transport.close().await;
        }
        self.state.phase = ConnectionPhase::Disconnected;

        if was_connected {
            info!(address = %self.config.server_address, "Disconnected from location server");
            self.connection_observers.emit(&ConnectionChange {
                connected: false,
                healthy: false,
            });
        }
    }

    /// Ask the server for the latest location.
    ///
    /// Logs and returns when not connected.
    pub async fn request_update(&mut self) {
        if self.state.phase != ConnectionPhase::Connected {
            warn!(phase = %self.state.phase, "Cannot request update while not connected");
            return;
        }
        self.send_frame(OutboundFrame::RequestUpdate).await;
    }

    /// Send a keepalive. Skipped silently when not healthy.
    pub async fn ping(&mut self) {
        if !self.is_healthy() {
            return;
        }
        self.send_frame(OutboundFrame::Ping).await;
    }

    /// Wait for the next transport event. Never resolves while closed.
    pub async fn next_event(&mut self) -> TransportEvent {
        self.transport.recv().await
    }

    /// Fold one transport event into the client.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.handle_message(&text),
            TransportEvent::Closed => {
                let was_connected = self.mark_disconnected();
                info!(address = %self.config.server_address, "Server closed the connection");
                if was_connected {
                    self.emit_disconnected();
                }
                if self.config.reconnect_enabled {
                    self.retry_at = Some(Instant::now() + SERVER_CLOSE_RETRY_DELAY);
                    debug!(
                        delay_ms = SERVER_CLOSE_RETRY_DELAY.as_millis() as u64,
                        "Scheduling reconnect after server close"
                    );
                }
            }
            TransportEvent::Lost(reason) => {
                let was_connected = self.mark_disconnected();
                warn!(reason = %reason, "Connection lost");
                if was_connected {
                    self.emit_disconnected();
                }
                self.emit_error(TransportError::ConnectionLost(reason).into());
                self.handle_unexpected_loss();
            }
            TransportEvent::Error(message) => {
                warn!(error = %message, "Transport error");
                self.emit_error(TransportError::Protocol(message).into());
            }
        }
    }

    /// Observe decoded location updates.
    pub fn on_update<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&LocationUpdate) + Send + 'static,
    {
        Subscription {
            kind: EventKind::Update,
            id: self.update_observers.subscribe(observer),
        }
    }

    /// Observe connection changes.
    pub fn on_connection_change<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&ConnectionChange) + Send + 'static,
    {
        Subscription {
            kind: EventKind::ConnectionChange,
            id: self.connection_observers.subscribe(observer),
        }
    }

    /// Observe errors. Errors never imply disconnection.
    pub fn on_error<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&TrackingError) + Send + 'static,
    {
        Subscription {
            kind: EventKind::Error,
            id: self.error_observers.subscribe(observer),
        }
    }

    /// Remove an observer. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        match subscription.kind {
            EventKind::Update => self.update_observers.unsubscribe(subscription.id),
            EventKind::ConnectionChange => self.connection_observers.unsubscribe(subscription.id),
            EventKind::Error => self.error_observers.unsubscribe(subscription.id),
        }
    }

    async fn open_transport(&mut self) {
        self.state.phase = ConnectionPhase::Connecting;
        let address = self.config.server_address.clone();
        let timeout = self.config.connect_timeout;
        info!(address = %address, attempt = self.state.attempt_count, "Connecting to location server");

        let result = match tokio::time::timeout(timeout, self.transport.open(&address)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout {
                address: address.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(()) => {
                self.state.phase = ConnectionPhase::Connected;
                self.state.attempt_count = 0;
                self.retry_at = None;
                info!(address = %address, "Connected to location server");
                let healthy = self.is_healthy();
                self.connection_observers.emit(&ConnectionChange {
                    connected: true,
                    healthy,
                });
            }
            Err(e) => {
                self.state.phase = ConnectionPhase::Disconnected;
                warn!(address = %address, error = %e, "Failed to connect");
                self.emit_error(e.into());
                self.handle_unexpected_loss();
            }
        }
    }

    fn handle_unexpected_loss(&mut self) {
        self.state.last_loss_at = Some(Utc::now());

        if !self.config.reconnect_enabled {
            debug!("Reconnect disabled, staying disconnected");
            return;
        }

        let max = self.config.max_reconnect_attempts;
        if self.state.attempt_count >= max {
            self.exhausted = true;
            self.retry_at = None;
            warn!(attempts = self.state.attempt_count, "Giving up on reconnecting");
            self.emit_error(TrackingError::ExhaustedRetries {
                attempts: self.state.attempt_count,
            });
            return;
        }

        self.state.attempt_count += 1;
        self.retry_at = Some(Instant::now() + self.config.reconnect_delay);
        info!(
            attempt = self.state.attempt_count,
            max_attempts = max,
            delay_ms = self.config.reconnect_delay.as_millis() as u64,
            "Scheduling reconnect"
        );
    }

    fn handle_message(&mut self, text: &str) {
        match parse_frame(text, Utc::now()) {
            Ok(InboundFrame::Location(update)) => {
                trace!(
                    lat = update.current.latitude,
                    lon = update.current.longitude,
                    status = %update.status,
                    "Location frame received"
                );
                self.update_observers.emit(&update);
            }
            Ok(InboundFrame::ServerError(message)) => {
                warn!(error = %message, "Server reported an error");
                self.emit_error(TransportError::Server(message).into());
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.emit_error(e.into());
            }
        }
    }

    async fn send_frame(&mut self, frame: OutboundFrame) {
        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(frame = ?frame, error = %e, "Failed to encode frame");
                self.emit_error(TransportError::Protocol(e.to_string()).into());
                return;
            }
        };
        if let Err(e) = self.transport.send(text).await {
            warn!(frame = ?frame, error = %e, "Failed to send frame");
            self.emit_error(e.into());
        }
    }

    /// Returns whether the client was connected before.
    fn mark_disconnected(&mut self) -> bool {
        let was_connected = self.state.phase == ConnectionPhase::Connected;
        self.state.phase = ConnectionPhase::Disconnected;
        was_connected
    }

    fn emit_disconnected(&mut self) {
        self.connection_observers.emit(&ConnectionChange {
            connected: false,
            healthy: false,
        });
    }

    fn emit_error(&mut self, error: TrackingError) {
        self.error_observers.emit(&error);
    }
}
