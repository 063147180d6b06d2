//! Caller-facing handle to one room.

use std::fmt;
use std::sync::Arc;

use roomlink_protocol::RoomId;
use roomlink_room::{RoomError, RoomEvent, RoomKey, RoomRecord, RoomStatus};
use roomlink_state::RemoteClock;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::{RoomlinkError, Session};

/// A room joined (or being joined) through a [`Client`](crate::Client).
///
/// The handle does not own the room: the connection's registry does. Once
/// the room leaves, accessors return `None` and [`status`](Self::status)
/// reports [`RoomStatus::Left`].
#[derive(Clone)]
pub struct Room {
    key: RoomKey,
    name: String,
    session: Arc<Mutex<Session>>,
}

impl Room {
    pub(crate) fn new(
        key: RoomKey,
        name: &str,
        session: Arc<Mutex<Session>>,
    ) -> Self {
        Self {
            key,
            name: name.to_string(),
            session,
        }
    }

    /// The name this room was joined with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The server-assigned id, once joined.
    pub async fn id(&self) -> Option<RoomId> {
        self.with_record(RoomRecord::id).await.flatten()
    }

    pub async fn status(&self) -> RoomStatus {
        self.with_record(RoomRecord::status)
            .await
            .unwrap_or(RoomStatus::Left)
    }

    /// A copy of the mirrored state.
    pub async fn state(&self) -> Option<Value> {
        self.with_record(|room| room.state().clone()).await
    }

    /// A copy of the state before the most recent patch.
    pub async fn previous_state(&self) -> Option<Value> {
        self.with_record(|room| room.previous_state().cloned())
            .await
            .flatten()
    }

    /// Server clock values from the most recent snapshot.
    pub async fn remote_clock(&self) -> Option<RemoteClock> {
        self.with_record(RoomRecord::remote_clock).await
    }

    /// Subscribes to this room's events.
    ///
    /// The first subscriber also receives the lifecycle events raised
    /// since the join was requested, so `Joined` is never missed, plus the
    /// most recent patches and data.
    ///
    /// # Errors
    /// `RoomError::Detached` if the room already left.
    pub async fn events(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<RoomEvent>, RoomlinkError> {
        let mut session = self.session.lock().await;
        let room = session
            .room_mut(self.key)
            .ok_or_else(|| RoomError::Detached(self.name.clone()))?;
        Ok(room.subscribe())
    }

    /// Sends application data to the room.
    ///
    /// Accepted before the join completes; the frame then carries id `0`.
    ///
    /// # Errors
    /// `RoomlinkError::Pending` before the connection has its identity,
    /// `RoomError::Detached` if the room already left, or
    /// `RoomlinkError::NotOpen` once the connection has closed.
    pub async fn send(&self, data: Value) -> Result<(), RoomlinkError> {
        self.session.lock().await.send_room_data(self.key, data)
    }

    /// Leaves the room.
    ///
    /// With `request_leave` on a joined room, a leave request goes to the
    /// server and `Left` fires once it confirms. Otherwise `Left` fires
    /// immediately and nothing is sent.
    ///
    /// # Errors
    /// `RoomlinkError::Pending` before the connection has its identity, or
    /// `RoomError::Detached` if the room already left.
    pub async fn leave(&self, request_leave: bool) -> Result<(), RoomlinkError> {
        self.session.lock().await.leave_room(self.key, request_leave)
    }

    async fn with_record<R>(&self, f: impl FnOnce(&RoomRecord) -> R) -> Option<R> {
        self.session.lock().await.room(self.key).map(f)
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
