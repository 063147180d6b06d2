//! Typed protocol messages and their positional wire form.
//!
//! A frame is `[opcode, ...args]`. Inbound frames are parsed into
//! [`ServerMessage`]; outbound requests are built as [`ClientMessage`] and
//! serialized back into the same positional shape.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{Codec, Opcode, ProtocolError, RoomAddress, RoomId};

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// A decoded frame sent by the room server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `[USER_ID, identity]`: the connection is open and has an identity.
    UserId { identity: String },

    /// `[JOIN_ROOM, roomId, roomName]`: the join for `room_name`
    /// succeeded and the room is now known as `room_id`.
    JoinRoom { room_id: RoomId, room_name: String },

    /// `[JOIN_ERROR, roomName, ...detail]`: the join was refused.
    JoinError {
        room: RoomAddress,
        detail: Vec<Value>,
    },

    /// `[LEAVE_ROOM, roomId]`: the server confirms the client left.
    LeaveRoom { room: RoomAddress },

    /// `[ROOM_STATE, roomId, state, remoteTime, remoteElapsed]`: a full
    /// snapshot. Missing timing values read as `0`.
    RoomState {
        room: RoomAddress,
        state: Value,
        remote_time: f64,
        remote_elapsed: f64,
    },

    /// `[ROOM_STATE_PATCH, roomId, patch]`: an incremental update. The
    /// patch document is left undecoded; the state layer owns its format.
    RoomStatePatch { room: RoomAddress, patch: Value },

    /// `[ROOM_DATA, roomId, payload]`: application data for the room.
    RoomData { room: RoomAddress, data: Value },
}

impl ServerMessage {
    /// Decodes raw bytes into a message.
    ///
    /// Returns `Ok(None)` when the first element is not one of the known
    /// opcodes, whatever its type, so newer servers keep working.
    ///
    /// # Errors
    /// Any frame that is not a non-empty array, or a known opcode with
    /// missing or mistyped arguments.
    pub fn decode<C: Codec>(
        codec: &C,
        data: &[u8],
    ) -> Result<Option<Self>, ProtocolError> {
        let frame: Vec<Value> = codec.decode(data)?;
        Self::from_frame(frame)
    }

    /// Parses an already-decoded frame.
    pub fn from_frame(frame: Vec<Value>) -> Result<Option<Self>, ProtocolError> {
        let mut values = frame.into_iter();

        let Some(first) = values.next() else {
            return Err(ProtocolError::InvalidMessage("empty frame".into()));
        };
        let Some(opcode) = first.as_u64().and_then(Opcode::from_code) else {
            return Ok(None);
        };

        let mut args = Args {
            opcode,
            position: 1,
            values,
        };

        let message = match opcode {
            Opcode::UserId => Self::UserId {
                identity: args.string()?,
            },
            Opcode::JoinRoom => {
                let room_id = match args.address()? {
                    RoomAddress::Id(id) => id,
                    RoomAddress::Name(name) => {
                        return Err(ProtocolError::InvalidMessage(format!(
                            "join ack for {name:?} carries no room id"
                        )));
                    }
                };
                Self::JoinRoom {
                    room_id,
                    room_name: args.string()?,
                }
            }
            Opcode::JoinError => Self::JoinError {
                room: args.address()?,
                detail: args.rest(),
            },
            Opcode::LeaveRoom => Self::LeaveRoom {
                room: args.address()?,
            },
            Opcode::RoomState => Self::RoomState {
                room: args.address()?,
                state: args.required()?,
                remote_time: args.number_or_zero()?,
                remote_elapsed: args.number_or_zero()?,
            },
            Opcode::RoomStatePatch => Self::RoomStatePatch {
                room: args.address()?,
                patch: args.required()?,
            },
            Opcode::RoomData => Self::RoomData {
                room: args.address()?,
                data: args.required()?,
            },
        };

        Ok(Some(message))
    }

    /// The opcode this message was decoded from.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::UserId { .. } => Opcode::UserId,
            Self::JoinRoom { .. } => Opcode::JoinRoom,
            Self::JoinError { .. } => Opcode::JoinError,
            Self::LeaveRoom { .. } => Opcode::LeaveRoom,
            Self::RoomState { .. } => Opcode::RoomState,
            Self::RoomStatePatch { .. } => Opcode::RoomStatePatch,
            Self::RoomData { .. } => Opcode::RoomData,
        }
    }
}

/// Positional argument reader for one frame.
struct Args<I> {
    opcode: Opcode,
    position: usize,
    values: I,
}

impl<I: Iterator<Item = Value>> Args<I> {
    fn required(&mut self) -> Result<Value, ProtocolError> {
        let position = self.position;
        self.position += 1;
        self.values.next().ok_or(ProtocolError::MissingArgument {
            opcode: self.opcode,
            position,
        })
    }

    fn address(&mut self) -> Result<RoomAddress, ProtocolError> {
        let value = self.required()?;
        RoomAddress::from_value(&value)
    }

    fn string(&mut self) -> Result<String, ProtocolError> {
        let position = self.position;
        match self.required()? {
            Value::String(s) => Ok(s),
            other => Err(ProtocolError::InvalidMessage(format!(
                "{} argument {position} must be a string, got {other}",
                self.opcode
            ))),
        }
    }

    fn number_or_zero(&mut self) -> Result<f64, ProtocolError> {
        let position = self.position;
        self.position += 1;
        match self.values.next() {
            None | Some(Value::Null) => Ok(0.0),
            Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or_default()),
            Some(other) => Err(ProtocolError::InvalidMessage(format!(
                "{} argument {position} must be a number, got {other}",
                self.opcode
            ))),
        }
    }

    fn rest(self) -> Vec<Value> {
        self.values.collect()
    }
}

/// Renders a join-error detail list for humans: strings verbatim, other
/// values as JSON, joined by `", "`.
pub fn describe_detail(detail: &[Value]) -> String {
    detail
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// A request the client sends to the room server.
///
/// Serializes to the positional array form, e.g.
/// `JoinRoom { name: "chat", options: null }` → `[10,"chat",null]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `[JOIN_ROOM, name, options]`
    JoinRoom { name: String, options: Value },

    /// `[LEAVE_ROOM, roomId]`
    LeaveRoom { room_id: RoomId },

    /// `[ROOM_DATA, roomId, payload]`
    ///
    /// `room_id` is [`RoomId::UNASSIGNED`] for a room whose join has not
    /// been acknowledged yet; the server decides what to do with that.
    RoomData { room_id: RoomId, data: Value },

    /// An arbitrary frame, passed through untouched.
    Raw(Vec<Value>),
}

impl ClientMessage {
    /// Encodes the message with the given codec.
    pub fn encode<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        codec.encode(self)
    }

    /// The opcode of this request, if it is not a raw frame.
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Self::JoinRoom { .. } => Some(Opcode::JoinRoom),
            Self::LeaveRoom { .. } => Some(Opcode::LeaveRoom),
            Self::RoomData { .. } => Some(Opcode::RoomData),
            Self::Raw(_) => None,
        }
    }
}

impl Serialize for ClientMessage {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        // Tuples serialize as sequences, which gives the positional form.
        match self {
            Self::JoinRoom { name, options } => {
                (Opcode::JoinRoom, name, options).serialize(serializer)
            }
            Self::LeaveRoom { room_id } => {
                (Opcode::LeaveRoom, room_id).serialize(serializer)
            }
            Self::RoomData { room_id, data } => {
                (Opcode::RoomData, room_id, data).serialize(serializer)
            }
            Self::Raw(values) => values.serialize(serializer),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
