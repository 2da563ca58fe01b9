//! Scripted in-memory transport.
//!
//! [`MockTransport`] is handed to the client; the paired [`MockRemote`] plays
//! the server: it pushes frames, closes or drops the connection, makes opens
//! fail and records what the client sent.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::transport::{Transport, TransportEvent};
use crate::tracking::error::TransportError;

#[derive(Debug, Default)]
struct MockShared {
    sender: Option<mpsc::UnboundedSender<TransportEvent>>,
    sent: Vec<String>,
    pending_failures: u32,
    open_delay: Option<Duration>,
    open_count: u32,
    last_address: Option<String>,
}

/// Client side of the scripted transport.
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<MockShared>>,
    receiver: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

/// Server side of the scripted transport.
#[derive(Debug, Clone)]
pub struct MockRemote {
    shared: Arc<Mutex<MockShared>>,
}

impl MockTransport {
    /// Create a linked transport/remote pair.
    pub fn pair() -> (Self, MockRemote) {
        let shared = Arc::new(Mutex::new(MockShared::default()));
        (
            Self {
                shared: shared.clone(),
                receiver: None,
            },
            MockRemote { shared },
        )
    }

    fn mark_closed(&mut self) {
        self.receiver = None;
        self.shared.lock().sender = None;
    }
}

impl Transport for MockTransport {
    async fn open(&mut self, address: &str) -> Result<(), TransportError> {
        let delay = {
            let mut shared = self.shared.lock();
            shared.open_count += 1;
            shared.last_address = Some(address.to_string());
            shared.open_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut shared = self.shared.lock();
        if shared.pending_failures > 0 {
            shared.pending_failures -= 1;
            return Err(TransportError::ConnectFailed {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        shared.sender = Some(tx);
        drop(shared);
        self.receiver = Some(rx);
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.receiver.is_none() {
            return Err(TransportError::NotOpen);
        }
        self.shared.lock().sent.push(text);
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        let Some(receiver) = self.receiver.as_mut() else {
            return std::future::pending().await;
        };
        let event = match receiver.recv().await {
            Some(event) => event,
            None => TransportEvent::Lost("remote dropped".to_string()),
        };
        if matches!(event, TransportEvent::Closed | TransportEvent::Lost(_)) {
            self.mark_closed();
        }
        event
    }

    async fn close(&mut self) {
        self.mark_closed();
    }

    fn is_open(&self) -> bool {
        self.receiver.is_some()
    }
}

impl MockRemote {
    fn push(&self, event: TransportEvent) -> bool {
        match &self.shared.lock().sender {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver a text frame. Returns false when no connection is open.
    pub fn push_message(&self, text: impl Into<String>) -> bool {
        self.push(TransportEvent::Message(text.into()))
    }

    /// Report a non-fatal transport error.
    pub fn push_error(&self, message: impl Into<String>) -> bool {
        self.push(TransportEvent::Error(message.into()))
    }

    /// Close the connection from the server side.
    pub fn close_from_server(&self) -> bool {
        self.push(TransportEvent::Closed)
    }

    /// Drop the connection unexpectedly.
    pub fn drop_connection(&self, reason: impl Into<String>) -> bool {
        self.push(TransportEvent::Lost(reason.into()))
    }

    /// Make the next `count` open attempts fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.shared.lock().pending_failures = count;
    }

    /// Delay every open attempt by `delay`.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        self.shared.lock().open_delay = delay;
    }

    /// Frames the client has sent so far.
    pub fn sent_frames(&self) -> Vec<String> {
        self.shared.lock().sent.clone()
    }

    /// Number of open attempts, successful or not.
    pub fn open_count(&self) -> u32 {
        self.shared.lock().open_count
    }

    /// Address passed to the most recent open.
    pub fn last_address(&self) -> Option<String> {
        self.shared.lock().last_address.clone()
    }

    /// True while the client side holds an open connection.
    pub fn is_connected(&self) -> bool {
        self.shared.lock().sender.is_some()
    }
}
