//! Real-time tram location reconciliation.
//!
//! Live fixes arrive over a push channel, are validated, and are folded into
//! a single smoothly moving transform for the rendered tram.
//!
//! # Architecture
//!
//! ```text
//!   Location server
//!         │ JSON frames
//!         ▼
//!  ┌───────────────┐  on_update / on_connection_change / on_error
//!  │ ChannelClient │ ───────────────────────────────┐
//!  └───────────────┘                                ▼
//!         ▲ request_update              ┌────────────────────┐
//!         └──────── actions ─────────── │ PositionReconciler │
//!                                       └────────────────────┘
//!                                         │ UpdateValidator
//!                                         │ Projection
//!                                         │ Animator → TransitionHandle
//!                                         ▼
//!                              watch::Receiver<TrackerSnapshot>
//! ```
//!
//! [`TrackingSession`] owns both halves and drives them from one task.
//!
//! # Example
//!
//! ```ignore
//! use tramtrack::tracking::{
//!     ChannelClient, ChannelConfig, PositionReconciler, ReconcilerConfig,
//!     SessionConfig, TrackingSession, WebSocketTransport,
//! };
//!
//! let client = ChannelClient::new(ChannelConfig::default(), WebSocketTransport::new());
//! let reconciler = PositionReconciler::new(ReconcilerConfig::default());
//! let session = TrackingSession::new(client, reconciler, SessionConfig::default());
//! let mut status = session.status();
//! let handle = session.start(cancellation.clone());
//! ```

pub mod channel;
pub mod error;
pub mod events;
pub mod fallback;
pub mod landmarks;
mod logger;
pub mod projection;
pub mod protocol;
pub mod reconciler;
pub mod session;
pub mod state;
pub mod transition;
pub mod validator;

pub use channel::{
    ChannelClient, ChannelConfig, MockRemote, MockTransport, Transport, TransportEvent,
    WebSocketTransport,
};
pub use error::{InvalidDataError, TrackingError, TransportError};
pub use events::{ConnectionChange, EventKind, Subscription};
pub use landmarks::{Landmark, LandmarkIndex};
pub use logger::{spawn_status_logger, DEFAULT_LOG_INTERVAL};
pub use projection::{Projection, ScenePosition, Transform};
pub use reconciler::{PositionReconciler, ReconcilerAction, ReconcilerConfig, UpdateOutcome};
pub use session::{SessionConfig, SharedReconciler, TrackingSession};
pub use state::{
    ConnectionPhase, ConnectionState, GeoPoint, LatLng, LocationUpdate, ReconcilerPhase,
    ReconcilerStatus, RunState, TrackerSnapshot, TrackingMode, TramStatus, UpdateStatus,
};
pub use transition::{Animator, LinearAnimator, TransitionHandle, TransitionPlan};
pub use validator::UpdateValidator;
