//! Push channel to the location server.
//!
//! # Architecture
//!
//! ```text
//! ChannelClient<T: Transport>
//!     │
//!     ├── Transport trait → WebSocketTransport (tokio-tungstenite)
//!     │                   → MockTransport (scripted, for tests)
//!     │
//!     └── observers: on_update / on_connection_change / on_error
//! ```

mod client;
mod config;
mod mock;
mod transport;
mod websocket;

pub use client::ChannelClient;
pub use config::{
    ChannelConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, DEFAULT_SERVER_ADDRESS,
    SERVER_CLOSE_RETRY_DELAY,
};
pub use mock::{MockRemote, MockTransport};
pub use transport::{Transport, TransportEvent};
pub use websocket::WebSocketTransport;
