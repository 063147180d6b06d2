//! One room's client-side record: identity, lifecycle, mirrored state,
//! and its subscribers.

use roomlink_protocol::{describe_detail, RoomId};
use roomlink_state::{Patch, RemoteClock, StateMirror};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{EventBus, RoomError, RoomEvent, RoomStatus};

/// A joined or joining room, as owned by the
/// [`RoomRegistry`](crate::RoomRegistry).
///
/// The name is fixed for the record's lifetime; the id appears once the
/// server acknowledges the join. Every state change goes through this
/// type so the matching [`RoomEvent`] is never missed.
#[derive(Debug)]
pub struct RoomRecord {
    name: String,
    id: Option<RoomId>,
    status: RoomStatus,
    mirror: StateMirror,
    events: EventBus<RoomEvent>,
}

impl RoomRecord {
    /// Creates an unjoined room.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            status: RoomStatus::Unjoined,
            mirror: StateMirror::new(),
            events: EventBus::buffered(),
        }
    }

    /// The name the join was requested with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The server-assigned id, once joined.
    pub fn id(&self) -> Option<RoomId> {
        self.id
    }

    /// The id to put on outbound frames: the assigned id, or
    /// [`RoomId::UNASSIGNED`] before the join completes.
    pub fn wire_id(&self) -> RoomId {
        self.id.unwrap_or(RoomId::UNASSIGNED)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> RoomStatus {
        self.status
    }

    /// The mirrored state (`null` until the first snapshot).
    pub fn state(&self) -> &Value {
        self.mirror.state()
    }

    /// The state before the most recent patch.
    pub fn previous_state(&self) -> Option<&Value> {
        self.mirror.previous_state()
    }

    /// Server clock values from the most recent snapshot.
    pub fn remote_clock(&self) -> RemoteClock {
        self.mirror.clock()
    }

    /// Subscribes to this room's events. The first subscriber also gets
    /// the backlog: `Joined`, `Error` and `Left` if they fired, plus the
    /// most recent patches and data. Snapshot `Updated` events are not
    /// held back; read [`state`](Self::state) instead.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Replaces the mirrored state wholesale and raises `Updated` with no
    /// patch.
    ///
    /// # Errors
    /// `RoomError::NotJoined` if the room is not `Joined`/`Leaving`.
    pub fn set_state(
        &mut self,
        state: Value,
        clock: RemoteClock,
    ) -> Result<(), RoomError> {
        self.ensure_accepts_state()?;
        self.mirror.replace(state, clock);
        tracing::debug!(room = %self.name, "state snapshot applied");
        self.emit_updated(None);
        Ok(())
    }

    /// Decodes and applies a patch document, then raises `Patched`
    /// followed by `Updated`.
    ///
    /// # Errors
    /// `RoomError::NotJoined` for a room that cannot take state, or
    /// `RoomError::Patch` if the document is malformed or any operation
    /// fails. The state is unchanged on error.
    pub fn apply_patch(&mut self, document: Value) -> Result<(), RoomError> {
        self.ensure_accepts_state()?;
        let patch = Patch::from_document(document).map_err(|source| {
            RoomError::Patch {
                room: self.name.clone(),
                source,
            }
        })?;
        self.mirror.apply(&patch).map_err(|source| RoomError::Patch {
            room: self.name.clone(),
            source,
        })?;

        tracing::debug!(room = %self.name, ops = patch.len(), "patch applied");
        self.events.emit(RoomEvent::Patched(patch.clone()));
        self.emit_updated(Some(patch));
        Ok(())
    }

    /// Raises `Data` without touching the state.
    pub fn receive_data(&mut self, data: Value) {
        self.events.emit(RoomEvent::Data(data));
    }

    /// Raises `Error` for a refused join.
    pub(crate) fn emit_join_error(&mut self, detail: Vec<Value>) {
        self.events.emit(RoomEvent::Error {
            message: describe_detail(&detail),
            detail,
        });
    }

    /// `Unjoined → Joined`. Raises `Joined`.
    ///
    /// The room stays `Unjoined` if `id` is the unassigned id.
    pub(crate) fn mark_joined(&mut self, id: RoomId) -> Result<(), RoomError> {
        if id == RoomId::UNASSIGNED {
            return Err(RoomError::UnassignedId(self.name.clone()));
        }
        self.transition(RoomStatus::Joined)?;
        self.id = Some(id);
        self.events.emit(RoomEvent::Joined { id });
        Ok(())
    }

    /// `Joined → Leaving`.
    pub(crate) fn mark_leaving(&mut self) -> Result<(), RoomError> {
        self.transition(RoomStatus::Leaving)
    }

    /// Any live status `→ Left`. Raises `Left` when `notify` is set.
    pub(crate) fn mark_left(&mut self, notify: bool) {
        if self.status == RoomStatus::Left {
            return;
        }
        self.status = RoomStatus::Left;
        if notify {
            self.events.emit(RoomEvent::Left);
        }
    }

    /// `Updated` carries a full copy of the state, so it is only built when
    /// a subscriber will see it.
    fn emit_updated(&mut self, patch: Option<Patch>) {
        if self.events.is_observed() {
            self.events.emit(RoomEvent::Updated {
                state: self.mirror.state().clone(),
                patch,
            });
        }
    }

    fn transition(&mut self, to: RoomStatus) -> Result<(), RoomError> {
        if !self.status.can_transition_to(to) {
            return Err(RoomError::InvalidTransition {
                room: self.name.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn ensure_accepts_state(&self) -> Result<(), RoomError> {
        if self.status.accepts_state() {
            Ok(())
        } else {
            Err(RoomError::NotJoined {
                room: self.name.clone(),
                status: self.status,
            })
        }
    }
}
