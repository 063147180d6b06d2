//! Error types for the room layer.

use roomlink_protocol::{RoomAddress, RoomId};
use roomlink_state::StateError;

use crate::RoomStatus;

/// Errors that can occur while routing a message to a room.
///
/// None of these are fatal: they are reported on the connection's error
/// channel and processing continues with the next message.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No registered room matches the address.
    #[error("room {0} not found")]
    NotFound(RoomAddress),

    /// A room handle outlived its registry entry.
    #[error("room {0:?} is no longer registered")]
    Detached(String),

    /// The server acknowledged a join for a room that already has an id.
    #[error("room {0} is already joined")]
    AlreadyJoined(RoomId),

    /// A join ack assigned the unassigned id `0`. The room stays pending.
    #[error("join ack for room {0:?} carries no room id")]
    UnassignedId(String),

    /// A state message reached a room that cannot take it.
    #[error("room {room:?} is {status}, cannot apply state")]
    NotJoined {
        /// The room's name.
        room: String,
        /// Its status when the message arrived.
        status: RoomStatus,
    },

    /// The lifecycle state machine refused a transition.
    #[error("room {room:?} cannot go from {from} to {to}")]
    InvalidTransition {
        /// The room's name.
        room: String,
        /// Current status.
        from: RoomStatus,
        /// Requested status.
        to: RoomStatus,
    },

    /// A patch could not be decoded or applied. The room's state is
    /// unchanged.
    #[error("patch for room {room:?} rejected: {source}")]
    Patch {
        /// The room's name.
        room: String,
        /// What went wrong.
        #[source]
        source: StateError,
    },
}
