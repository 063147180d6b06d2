//! Transport abstraction layer for Roomlink.
//!
//! Provides the [`Connection`] trait that abstracts over the byte-stream
//! connection a client keeps open to a room server, plus two
//! implementations:
//!
//! - [`WebSocketConnection`] dials a server over WebSocket.
//! - [`MemoryConnection`] is an in-process pair, handy for driving a client
//!   without a network.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket dialer via `tokio-tungstenite`

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryPeer};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::future::Future;

/// A single open connection that can send and receive whole frames.
///
/// One call to [`recv`](Connection::recv) yields exactly one frame: the
/// transport never coalesces or splits what the peer sent.
///
/// The methods return `Send` futures so a client can drive the read half
/// and the write half from separate Tokio tasks sharing one `Arc`.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
