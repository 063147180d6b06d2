//! Unified error type for Roomlink, plus the error payload carried by
//! connection events.

use std::sync::Arc;
use std::time::Duration;

use roomlink_protocol::ProtocolError;
use roomlink_room::RoomError;
use roomlink_transport::TransportError;
use serde_json::Value;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `roomlink` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum RoomlinkError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (unknown room, lifecycle violation, bad patch).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The server has not assigned an identity yet. Only joins are
    /// accepted until it does.
    #[error("connection is still waiting for its identity")]
    Pending,

    /// The connection is closed.
    #[error("connection is not open")]
    NotOpen,

    /// The server did not accept the connection in time.
    #[error("connecting to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout {
        endpoint: String,
        timeout: Duration,
    },
}

/// A non-fatal failure reported on the connection's event stream.
///
/// The processing loop keeps running after every one of these; they exist
/// so subscribers can see what was dropped and why.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The server refused to join a room. The room was deregistered.
    #[error("join for room {room:?} rejected: {message}")]
    JoinRejected {
        room: String,
        message: String,
        detail: Vec<Value>,
    },

    /// An inbound frame could not be decoded and was dropped.
    #[error("dropped frame: {0}")]
    Decode(Arc<ProtocolError>),

    /// An inbound frame could not be applied to its room.
    #[error(transparent)]
    Room(Arc<RoomError>),

    /// The transport failed. A `Closed` event follows.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Decode(Arc::new(err))
    }
}

impl From<RoomError> for ClientError {
    fn from(err: RoomError) -> Self {
        Self::Room(Arc::new(err))
    }
}
