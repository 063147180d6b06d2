//! The connection's protocol engine, free of any I/O.
//!
//! A [`Session`] takes inbound frames one at a time, routes them to rooms,
//! and queues outbound frames on a channel. The async [`Client`] owns one
//! behind a mutex and feeds it from its reader task; tests drive it
//! directly.
//!
//! [`Client`]: crate::Client

use roomlink_protocol::{
    describe_detail, ClientMessage, Codec, JsonCodec, ProtocolError,
    RoomAddress, ServerMessage,
};
use roomlink_room::{
    EventBus, LeaveOutcome, Replay, Retention, RoomError, RoomKey, RoomRecord,
    RoomRegistry,
};
use roomlink_state::RemoteClock;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{ClientError, RoomlinkError};

/// Something that happened to the connection as a whole.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The server assigned this connection its identity. Room operations
    /// other than queued joins are meaningful from here on.
    Opened { identity: String },

    /// Application data arrived for a room. Fires after the room's own
    /// `Data` event.
    Message { room: RoomAddress, data: Value },

    /// A message was dropped or rejected. Processing continues.
    Error(ClientError),

    /// The transport is gone. Every room has already seen `Left`.
    Closed { reason: String },
}

impl Replay for ClientEvent {
    fn retention(&self) -> Retention {
        match self {
            Self::Opened { .. } | Self::Closed { .. } => Retention::Keep,
            Self::Message { .. } | Self::Error(_) => Retention::Recent,
        }
    }
}

/// Protocol state for one connection.
#[derive(Debug)]
pub struct Session<C: Codec = JsonCodec> {
    codec: C,
    identity: Option<String>,
    registry: RoomRegistry,
    events: EventBus<ClientEvent>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    closed: bool,
}

impl Session<JsonCodec> {
    /// Creates a session that speaks JSON and queues encoded frames on
    /// `outbound`.
    pub fn new(outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self::with_codec(JsonCodec, outbound)
    }
}

impl<C: Codec> Session<C> {
    /// Creates a session with a custom codec.
    pub fn with_codec(
        codec: C,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            codec,
            identity: None,
            registry: RoomRegistry::new(),
            events: EventBus::buffered(),
            outbound: Some(outbound),
            closed: false,
        }
    }

    /// The identity from `USER_ID`, once received.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Returns `true` once an identity arrived and until the transport
    /// closes.
    pub fn is_open(&self) -> bool {
        self.identity.is_some() && !self.closed
    }

    /// Returns `true` after [`transport_closed`](Self::transport_closed).
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Subscribes to connection events. The first subscriber also receives
    /// what was raised before it: `Opened` and `Closed`, plus the most
    /// recent messages and errors.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn room(&self, key: RoomKey) -> Option<&RoomRecord> {
        self.registry.get(key)
    }

    pub fn room_mut(&mut self, key: RoomKey) -> Option<&mut RoomRecord> {
        self.registry.get_mut(key)
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    /// Processes one inbound frame.
    ///
    /// Never fails: undecodable frames and frames that cannot be applied
    /// are logged, reported as [`ClientEvent::Error`], and dropped.
    pub fn handle_frame(&mut self, frame: &[u8]) {
        let message = match ServerMessage::decode(&self.codec, frame) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!("ignoring frame with unknown opcode");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                self.events.emit(ClientEvent::Error(e.into()));
                return;
            }
        };

        let opcode = message.opcode();
        tracing::debug!(%opcode, "frame received");
        if let Err(e) = self.dispatch(message) {
            tracing::warn!(%opcode, error = %e, "frame rejected");
            self.events.emit(ClientEvent::Error(e.into()));
        }
    }

    fn dispatch(&mut self, message: ServerMessage) -> Result<(), RoomError> {
        match message {
            ServerMessage::UserId { identity } => {
                tracing::info!(%identity, "connection opened");
                self.identity = Some(identity.clone());
                self.events.emit(ClientEvent::Opened { identity });
            }

            ServerMessage::JoinRoom { room_id, room_name } => {
                self.registry.acknowledge_join(room_id, &room_name)?;
            }

            ServerMessage::JoinError { room, detail } => {
                let message = describe_detail(&detail);
                let record = self.registry.reject_join(&room, detail.clone())?;
                self.events.emit(ClientEvent::Error(ClientError::JoinRejected {
                    room: record.name().to_string(),
                    message,
                    detail,
                }));
            }

            ServerMessage::LeaveRoom { room } => {
                self.registry.confirm_leave(&room)?;
            }

            ServerMessage::RoomState {
                room,
                state,
                remote_time,
                remote_elapsed,
            } => {
                let clock = RemoteClock {
                    current_time: remote_time,
                    elapsed: remote_elapsed,
                };
                self.registry.find_mut(&room)?.set_state(state, clock)?;
            }

            ServerMessage::RoomStatePatch { room, patch } => {
                self.registry.find_mut(&room)?.apply_patch(patch)?;
            }

            ServerMessage::RoomData { room, data } => {
                self.registry.find_mut(&room)?.receive_data(data.clone());
                self.events.emit(ClientEvent::Message { room, data });
            }
        }
        Ok(())
    }

    /// Reports a transport failure on the event stream. The caller is
    /// expected to follow up with [`transport_closed`](Self::transport_closed).
    pub fn transport_error(&mut self, message: String) {
        tracing::warn!(error = %message, "transport error");
        self.events
            .emit(ClientEvent::Error(ClientError::Transport(message)));
    }

    /// Tears down after the transport closed: every room leaves, the
    /// registry empties, then `Closed` fires. Later calls are no-ops.
    ///
    /// Drops the outbound sender, which lets the writer drain and stop.
    pub fn transport_closed(&mut self, reason: impl Into<String>) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.outbound = None;

        let reason = reason.into();
        self.registry.close_all();
        tracing::info!(%reason, "connection closed");
        self.events.emit(ClientEvent::Closed { reason });
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    /// Registers (or reuses) the pending room `name` and queues
    /// `[JOIN_ROOM, name, options]`.
    ///
    /// Allowed before the identity arrives; the request goes out in order.
    ///
    /// # Errors
    /// `RoomlinkError::NotOpen` once the transport has closed.
    pub fn join(
        &mut self,
        name: &str,
        options: Value,
    ) -> Result<RoomKey, RoomlinkError> {
        self.send(ClientMessage::JoinRoom {
            name: name.to_string(),
            options,
        })?;
        Ok(self.registry.open_or_join(name))
    }

    /// Queues `[ROOM_DATA, id, data]` for a room. Before the join is
    /// acknowledged the id is `0`; the server decides what that means.
    ///
    /// # Errors
    /// `RoomlinkError::Pending` before the identity arrives,
    /// `RoomError::Detached` if the room already left, or
    /// `RoomlinkError::NotOpen` once the transport has closed.
    pub fn send_room_data(
        &mut self,
        key: RoomKey,
        data: Value,
    ) -> Result<(), RoomlinkError> {
        self.ensure_open()?;
        let room_id = self
            .registry
            .get(key)
            .map(RoomRecord::wire_id)
            .ok_or_else(|| RoomError::Detached(key.to_string()))?;
        self.send(ClientMessage::RoomData { room_id, data })
    }

    /// Leaves a room. See [`RoomRegistry::leave`] for when a request goes
    /// out and when the room leaves on the spot.
    ///
    /// # Errors
    /// `RoomlinkError::Pending` before the identity arrives,
    /// `RoomError::Detached` if the room already left, or
    /// `RoomlinkError::NotOpen` if the leave request cannot be queued.
    pub fn leave_room(
        &mut self,
        key: RoomKey,
        request_leave: bool,
    ) -> Result<(), RoomlinkError> {
        self.ensure_open()?;
        match self.registry.leave(key, request_leave)? {
            LeaveOutcome::Requested(room_id) => {
                self.send(ClientMessage::LeaveRoom { room_id })
            }
            LeaveOutcome::AlreadyLeaving | LeaveOutcome::Left => Ok(()),
        }
    }

    /// Queues an arbitrary frame. It must be a non-empty array whose first
    /// element is an opcode.
    ///
    /// # Errors
    /// `RoomlinkError::Pending` before the identity arrives,
    /// `ProtocolError::InvalidMessage` for a frame without an opcode, or
    /// `RoomlinkError::NotOpen` once the transport has closed.
    pub fn send_raw(&mut self, frame: Vec<Value>) -> Result<(), RoomlinkError> {
        self.ensure_open()?;
        match frame.first() {
            Some(Value::Number(n)) if n.is_u64() => {}
            _ => {
                return Err(ProtocolError::InvalidMessage(
                    "raw frame must start with an opcode".into(),
                )
                .into());
            }
        }
        self.send(ClientMessage::Raw(frame))
    }

    /// Room operations other than joins wait for the identity.
    fn ensure_open(&self) -> Result<(), RoomlinkError> {
        if self.closed || self.outbound.is_none() {
            Err(RoomlinkError::NotOpen)
        } else if self.identity.is_none() {
            Err(RoomlinkError::Pending)
        } else {
            Ok(())
        }
    }

    fn send(&mut self, message: ClientMessage) -> Result<(), RoomlinkError> {
        let outbound = self.outbound.as_ref().ok_or(RoomlinkError::NotOpen)?;
        let bytes = message.encode(&self.codec)?;
        outbound.send(bytes).map_err(|_| RoomlinkError::NotOpen)?;
        tracing::debug!(opcode = ?message.opcode(), "frame queued");
        Ok(())
    }
}
