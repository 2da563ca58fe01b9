//! WebSocket transport over `tokio-tungstenite`.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::transport::{Transport, TransportEvent};
use crate::tracking::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`Transport`] backed by a WebSocket connection.
#[derive(Default)]
pub struct WebSocketTransport {
    stream: Option<WsStream>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for WebSocketTransport {
    async fn open(&mut self, address: &str) -> Result<(), TransportError> {
        let (stream, response) =
            tokio_tungstenite::connect_async(address)
                .await
                .map_err(|e| TransportError::ConnectFailed {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;

        tracing::debug!(
            address,
            status = response.status().as_u16(),
            "WebSocket handshake complete"
        );
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return std::future::pending().await;
            };

            match stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Message(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(e) => TransportEvent::Error(format!("non-UTF-8 binary frame: {}", e)),
                    };
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(frame = ?frame, "Server closed WebSocket");
                    self.stream = None;
                    return TransportEvent::Closed;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.stream = None;
                    return TransportEvent::Lost(e.to_string());
                }
                None => {
                    self.stream = None;
                    return TransportEvent::Lost("stream ended".to_string());
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Error while closing WebSocket");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
