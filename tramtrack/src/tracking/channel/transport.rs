//! Transport abstraction for the push channel.
//!
//! The client only needs a bidirectional text-frame pipe. [`Transport`]
//! abstracts over it so the client can run against a real WebSocket
//! ([`super::WebSocketTransport`]) or a scripted one
//! ([`super::MockTransport`]).

use std::future::Future;

use crate::tracking::error::TransportError;

/// Something that happened on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),
    /// The server closed the connection cleanly.
    Closed,
    /// The connection dropped unexpectedly.
    Lost(String),
    /// A non-fatal transport error; the connection stays up.
    Error(String),
}

/// Bidirectional text-frame transport.
///
/// After `recv` yields [`TransportEvent::Closed`] or [`TransportEvent::Lost`]
/// the transport is no longer open. `recv` on a transport that is not open
/// never resolves.
pub trait Transport: Send {
    /// Open a connection to `address`.
    fn open(&mut self, address: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send one text frame.
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next event.
    fn recv(&mut self) -> impl Future<Output = TransportEvent> + Send;

    /// Close the connection. No-op when not open.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// True while a connection is open.
    fn is_open(&self) -> bool;
}
