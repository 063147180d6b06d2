//! Core protocol types: opcodes and room identifiers.
//!
//! Every frame on the wire is a JSON array whose first element is an
//! [`Opcode`]. Most opcodes then carry a room address as their second
//! element, which is either a server-assigned numeric [`RoomId`] or the
//! room's name, depending on how far along the join is.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// The integer tag at position 0 of every frame.
///
/// The numeric values are protocol constants shared with the server, so
/// the enum is `#[repr(u8)]` and converted explicitly rather than through
/// a derived serde representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Server → Client: the connection's identity. Completes the open.
    UserId = 1,
    /// Both directions: a join request (client) or join ack (server).
    JoinRoom = 10,
    /// Server → Client: the server refused a join.
    JoinError = 11,
    /// Both directions: a leave request (client) or leave ack (server).
    LeaveRoom = 12,
    /// Both directions: application data addressed to a room.
    RoomData = 13,
    /// Server → Client: a full state snapshot.
    RoomState = 14,
    /// Server → Client: an incremental state patch.
    RoomStatePatch = 15,
}

impl Opcode {
    /// Maps a wire value to an opcode.
    ///
    /// Returns `None` for values outside the enumeration. Callers treat
    /// that as "a newer server feature" and skip the frame.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::UserId),
            10 => Some(Self::JoinRoom),
            11 => Some(Self::JoinError),
            12 => Some(Self::LeaveRoom),
            13 => Some(Self::RoomData),
            14 => Some(Self::RoomState),
            15 => Some(Self::RoomStatePatch),
            _ => None,
        }
    }

    /// Returns the wire value.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UserId => "USER_ID",
            Self::JoinRoom => "JOIN_ROOM",
            Self::JoinError => "JOIN_ERROR",
            Self::LeaveRoom => "LEAVE_ROOM",
            Self::RoomData => "ROOM_DATA",
            Self::RoomState => "ROOM_STATE",
            Self::RoomStatePatch => "ROOM_STATE_PATCH",
        };
        f.write_str(name)
    }
}

impl Serialize for Opcode {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// The numeric identifier the server assigns to a room at join time.
///
/// A newtype over `u64` so it can't be confused with other integers.
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl RoomId {
    /// The placeholder sent for a room the server has not assigned yet.
    pub const UNASSIGNED: RoomId = RoomId(0);
}

/// Displays as the bare number: the "string form" of the id that the
/// registry re-keys a room under.
impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomAddress
// ---------------------------------------------------------------------------

/// How a frame refers to a room.
///
/// Before a join completes the server only knows the room by the name the
/// client asked for; afterwards it uses the numeric id. The wire carries no
/// type tag, so the variant is chosen from the JSON shape of the value:
/// an unsigned integer is an id, a string is a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomAddress {
    /// Post-join addressing.
    Id(RoomId),
    /// Pre-join addressing.
    Name(String),
}

impl RoomAddress {
    /// Classifies a wire value by its runtime shape.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidAddress` for anything other than an
    /// unsigned integer or a string (negative numbers, floats, objects...).
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(|id| Self::Id(RoomId(id)))
                .ok_or_else(|| ProtocolError::InvalidAddress(value.clone())),
            Value::String(name) => Ok(Self::Name(name.clone())),
            other => Err(ProtocolError::InvalidAddress(other.clone())),
        }
    }

    /// Returns the id, if this is a post-join address.
    pub fn id(&self) -> Option<RoomId> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(_) => None,
        }
    }
}

impl From<RoomId> for RoomAddress {
    fn from(id: RoomId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for RoomAddress {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl fmt::Display for RoomAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name:?}"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
