//! Transport abstraction layer for Cardroom.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! the persistent, message-oriented connection a game client keeps open to
//! its server, plus the [`ReconnectPolicy`] used when that connection drops.
//!
//! The transport only moves text frames. It knows nothing about event
//! names, rooms, or game state; that is the protocol layer's job.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`

mod backoff;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use backoff::ReconnectPolicy;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

/// Opaque identifier for one established connection.
///
/// Every successful (re)connect produces a fresh, strictly larger id, so
/// higher layers can tell a genuinely new connection apart from a
/// duplicated or late acknowledgement of an older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens connections to a single, fixed endpoint.
///
/// The connector is held for the whole life of a client and asked for a
/// new connection every time the previous one is lost.
///
/// The returned futures are `Send` so the link task that drives them can
/// be spawned onto the Tokio runtime.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Opens a new connection to the endpoint.
    fn connect(
        &self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Human-readable endpoint, used in logs.
    fn endpoint(&self) -> &str;
}

/// A single established connection that carries text frames.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(
        &self,
        frame: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
