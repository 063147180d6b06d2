//! Room registry: owns every room and resolves wire addresses to them.

use std::collections::HashMap;
use std::fmt;

use roomlink_protocol::{RoomAddress, RoomId};
use serde_json::Value;

use crate::{RoomError, RoomRecord, RoomStatus};

/// Stable handle to a room inside a [`RoomRegistry`].
///
/// Unlike the wire address, the key never changes when the room is joined,
/// so handles held by callers survive the name→id re-key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey(u64);

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What [`RoomRegistry::leave`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room is now `Leaving`; a leave request for this id must be sent.
    Requested(RoomId),
    /// A leave request is already out. Nothing to send.
    AlreadyLeaving,
    /// The room left locally and was deregistered.
    Left,
}

/// Every room this connection knows about.
///
/// Rooms live in an arena keyed by [`RoomKey`]. Two lookup tables map wire
/// addresses to keys: pending rooms are found by name, joined rooms by id.
/// A room is in exactly one of the two tables at any time. The re-key on
/// join acknowledgement moves it between them inside a single `&mut self`
/// call, so no caller can observe it in both or in neither.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomKey, RoomRecord>,
    by_name: HashMap<String, RoomKey>,
    by_id: HashMap<RoomId, RoomKey>,
    next_key: u64,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending room registered under `name`, creating it if
    /// there is none.
    ///
    /// Only pending rooms are addressable by name: joining a name that is
    /// already joined creates a second, independent room.
    pub fn open_or_join(&mut self, name: &str) -> RoomKey {
        if let Some(key) = self.by_name.get(name) {
            tracing::debug!(room = name, "join requested for pending room");
            return *key;
        }

        self.next_key += 1;
        let key = RoomKey(self.next_key);
        self.rooms.insert(key, RoomRecord::new(name));
        self.by_name.insert(name.to_string(), key);
        tracing::debug!(room = name, %key, "room registered");
        key
    }

    /// Handles a join acknowledgement: re-keys the pending room `name`
    /// under `id` and marks it joined.
    ///
    /// # Errors
    /// - `RoomError::AlreadyJoined` if a room already holds `id`.
    /// - `RoomError::NotFound` if no room is pending under `name`.
    /// - `RoomError::UnassignedId` if `id` is `0`. The room stays pending.
    pub fn acknowledge_join(
        &mut self,
        id: RoomId,
        name: &str,
    ) -> Result<RoomKey, RoomError> {
        if self.by_id.contains_key(&id) {
            return Err(RoomError::AlreadyJoined(id));
        }
        let key = *self
            .by_name
            .get(name)
            .ok_or_else(|| RoomError::NotFound(RoomAddress::from(name)))?;
        let room = self
            .rooms
            .get_mut(&key)
            .ok_or_else(|| RoomError::NotFound(RoomAddress::from(name)))?;

        room.mark_joined(id)?;
        self.by_name.remove(name);
        self.by_id.insert(id, key);

        tracing::info!(room = name, %id, "room joined");
        Ok(key)
    }

    /// Handles a join error: raises the room's `Error` event and
    /// deregisters it.
    ///
    /// Returns the removed record. Dropping it closes the room's event
    /// channels.
    ///
    /// # Errors
    /// `RoomError::NotFound` if the address matches no room.
    pub fn reject_join(
        &mut self,
        address: &RoomAddress,
        detail: Vec<Value>,
    ) -> Result<RoomRecord, RoomError> {
        let key = self
            .resolve(address)
            .ok_or_else(|| RoomError::NotFound(address.clone()))?;
        let mut room = self
            .deregister(key)
            .ok_or_else(|| RoomError::NotFound(address.clone()))?;

        room.emit_join_error(detail);
        room.mark_left(false);
        tracing::info!(room = room.name(), "join rejected");
        Ok(room)
    }

    /// Handles a leave acknowledgement from the server: raises `Left` and
    /// deregisters the room without sending anything.
    ///
    /// # Errors
    /// `RoomError::NotFound` if the address matches no room.
    pub fn confirm_leave(
        &mut self,
        address: &RoomAddress,
    ) -> Result<RoomRecord, RoomError> {
        let key = self
            .resolve(address)
            .ok_or_else(|| RoomError::NotFound(address.clone()))?;
        let mut room = self
            .deregister(key)
            .ok_or_else(|| RoomError::NotFound(address.clone()))?;

        room.mark_left(true);
        tracing::info!(room = room.name(), "room left");
        Ok(room)
    }

    /// Caller-initiated leave.
    ///
    /// A joined room with a non-zero id and `request_leave` set moves to
    /// `Leaving` and stays registered until the server confirms. Otherwise the room leaves
    /// right away: `Left` fires and the room is deregistered.
    ///
    /// # Errors
    /// `RoomError::Detached` if the key is no longer registered.
    pub fn leave(
        &mut self,
        key: RoomKey,
        request_leave: bool,
    ) -> Result<LeaveOutcome, RoomError> {
        let room = self
            .rooms
            .get_mut(&key)
            .ok_or_else(|| RoomError::Detached(key.to_string()))?;

        if request_leave {
            let id = room.id().filter(|id| *id != RoomId::UNASSIGNED);
            match (room.status(), id) {
                (RoomStatus::Joined, Some(id)) => {
                    room.mark_leaving()?;
                    tracing::debug!(room = room.name(), %id, "leave requested");
                    return Ok(LeaveOutcome::Requested(id));
                }
                (RoomStatus::Leaving, Some(_)) => {
                    return Ok(LeaveOutcome::AlreadyLeaving);
                }
                _ => {}
            }
        }

        if let Some(mut room) = self.deregister(key) {
            room.mark_left(true);
            tracing::info!(room = room.name(), "room left locally");
        }
        Ok(LeaveOutcome::Left)
    }

    /// Leaves every room (raising `Left` on each) and empties the registry.
    /// Returns how many rooms were dropped.
    pub fn close_all(&mut self) -> usize {
        let mut keys: Vec<RoomKey> = self.rooms.keys().copied().collect();
        keys.sort();

        for key in &keys {
            if let Some(room) = self.rooms.get_mut(key) {
                room.mark_left(true);
            }
        }
        self.rooms.clear();
        self.by_name.clear();
        self.by_id.clear();

        if !keys.is_empty() {
            tracing::info!(rooms = keys.len(), "all rooms left");
        }
        keys.len()
    }

    /// Looks up the key a wire address currently refers to.
    pub fn resolve(&self, address: &RoomAddress) -> Option<RoomKey> {
        match address {
            RoomAddress::Id(id) => self.by_id.get(id).copied(),
            RoomAddress::Name(name) => self.by_name.get(name).copied(),
        }
    }

    /// Resolves an address straight to its room.
    ///
    /// # Errors
    /// `RoomError::NotFound` if the address matches no room.
    pub fn find_mut(
        &mut self,
        address: &RoomAddress,
    ) -> Result<&mut RoomRecord, RoomError> {
        self.resolve(address)
            .and_then(|key| self.rooms.get_mut(&key))
            .ok_or_else(|| RoomError::NotFound(address.clone()))
    }

    pub fn get(&self, key: RoomKey) -> Option<&RoomRecord> {
        self.rooms.get(&key)
    }

    pub fn get_mut(&mut self, key: RoomKey) -> Option<&mut RoomRecord> {
        self.rooms.get_mut(&key)
    }

    /// Returns `true` if a pending room is registered under `name`.
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Returns `true` if a joined room is registered under `id`.
    pub fn contains_id(&self, id: RoomId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Number of registered rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Removes a room from the arena and whichever table points at it.
    fn deregister(&mut self, key: RoomKey) -> Option<RoomRecord> {
        let room = self.rooms.remove(&key)?;
        match room.id() {
            Some(id) => self.by_id.remove(&id),
            None => self.by_name.remove(room.name()),
        };
        tracing::debug!(room = room.name(), %key, "room deregistered");
        Some(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomEvent;
    use serde_json::json;

    /// Every arena entry is reachable from exactly one table, and every
    /// table entry points into the arena.
    fn assert_consistent(registry: &RoomRegistry) {
        assert_eq!(
            registry.rooms.len(),
            registry.by_name.len() + registry.by_id.len()
        );
        for (name, key) in &registry.by_name {
            let room = &registry.rooms[key];
            assert_eq!(room.name(), name);
            assert_eq!(room.id(), None);
        }
        for (id, key) in &registry.by_id {
            assert_eq!(registry.rooms[key].id(), Some(*id));
        }
    }

    #[test]
    fn test_open_or_join_reuses_pending_room() {
        let mut registry = RoomRegistry::new();
        let a = registry.open_or_join("chat");
        let b = registry.open_or_join("chat");
        let c = registry.open_or_join("lobby");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
        assert_consistent(&registry);
    }

    #[test]
    fn test_acknowledge_join_rekeys_same_room() {
        let mut registry = RoomRegistry::new();
        let key = registry.open_or_join("chat");
        let mut rx = registry.get_mut(key).unwrap().subscribe();

        let acked = registry.acknowledge_join(RoomId(7), "chat").unwrap();

        assert_eq!(acked, key);
        assert!(!registry.contains_name("chat"));
        assert!(registry.contains_id(RoomId(7)));
        assert_eq!(registry.resolve(&RoomAddress::Id(RoomId(7))), Some(key));
        assert_eq!(registry.get(key).unwrap().status(), RoomStatus::Joined);
        assert_eq!(rx.try_recv().unwrap(), RoomEvent::Joined { id: RoomId(7) });
        assert!(rx.try_recv().is_err());
        assert_consistent(&registry);
    }

    #[test]
    fn test_duplicate_ack_is_rejected() {
        let mut registry = RoomRegistry::new();
        registry.open_or_join("chat");
        registry.acknowledge_join(RoomId(7), "chat").unwrap();

        let err = registry.acknowledge_join(RoomId(7), "chat").unwrap_err();
        assert!(matches!(err, RoomError::AlreadyJoined(RoomId(7))));
        assert_eq!(registry.len(), 1);
        assert_consistent(&registry);
    }

    #[test]
    fn test_ack_for_unknown_name() {
        let mut registry = RoomRegistry::new();
        let err = registry.acknowledge_join(RoomId(3), "ghost").unwrap_err();
        assert!(matches!(err, RoomError::NotFound(RoomAddress::Name(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_zero_id_ack_keeps_room_pending() {
        let mut registry = RoomRegistry::new();
        let key = registry.open_or_join("chat");

        let err = registry
            .acknowledge_join(RoomId::UNASSIGNED, "chat")
            .unwrap_err();
        assert!(matches!(err, RoomError::UnassignedId(_)));
        assert!(registry.contains_name("chat"));
        assert!(!registry.contains_id(RoomId::UNASSIGNED));
        assert_eq!(registry.get(key).unwrap().status(), RoomStatus::Unjoined);
        assert_consistent(&registry);

        // No leave request goes out for a room without a real id.
        assert_eq!(registry.leave(key, true).unwrap(), LeaveOutcome::Left);
        assert!(registry.is_empty());

        // A later ack with a real id still works for a fresh join.
        registry.open_or_join("chat");
        assert!(registry.acknowledge_join(RoomId(7), "chat").is_ok());
        assert_consistent(&registry);
    }

    #[test]
    fn test_joining_a_joined_name_opens_second_room() {
        let mut registry = RoomRegistry::new();
        let first = registry.open_or_join("chat");
        registry.acknowledge_join(RoomId(7), "chat").unwrap();

        let second = registry.open_or_join("chat");
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
        assert_consistent(&registry);
    }

    #[test]
    fn test_reject_join_deregisters_and_emits_error() {
        let mut registry = RoomRegistry::new();
        let key = registry.open_or_join("chat");
        let mut rx = registry.get_mut(key).unwrap().subscribe();

        let room = registry
            .reject_join(&RoomAddress::from("chat"), vec![json!("room full")])
            .unwrap();

        assert_eq!(room.status(), RoomStatus::Left);
        assert!(registry.is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            RoomEvent::Error {
                message: "room full".into(),
                detail: vec![json!("room full")],
            }
        );
        drop(room);
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_confirm_leave_by_id() {
        let mut registry = RoomRegistry::new();
        let key = registry.open_or_join("chat");
        registry.acknowledge_join(RoomId(7), "chat").unwrap();
        let mut rx = registry.get_mut(key).unwrap().subscribe();

        registry.confirm_leave(&RoomAddress::Id(RoomId(7))).unwrap();

        assert!(registry.is_empty());
        // The first subscriber also sees what happened before it subscribed.
        assert_eq!(rx.try_recv().unwrap(), RoomEvent::Joined { id: RoomId(7) });
        assert_eq!(rx.try_recv().unwrap(), RoomEvent::Left);
        assert!(registry.confirm_leave(&RoomAddress::Id(RoomId(7))).is_err());
    }

    #[test]
    fn test_leave_joined_room_requests_then_waits() {
        let mut registry = RoomRegistry::new();
        let key = registry.open_or_join("chat");
        let mut rx = registry.get_mut(key).unwrap().subscribe();
        registry.acknowledge_join(RoomId(7), "chat").unwrap();
        assert_eq!(rx.try_recv().unwrap(), RoomEvent::Joined { id: RoomId(7) });

        assert_eq!(
            registry.leave(key, true).unwrap(),
            LeaveOutcome::Requested(RoomId(7))
        );
        assert_eq!(
            registry.leave(key, true).unwrap(),
            LeaveOutcome::AlreadyLeaving
        );
        assert_eq!(registry.get(key).unwrap().status(), RoomStatus::Leaving);
        assert!(registry.contains_id(RoomId(7)));
        assert!(rx.try_recv().is_err());

        registry.confirm_leave(&RoomAddress::Id(RoomId(7))).unwrap();
        assert_eq!(rx.try_recv().unwrap(), RoomEvent::Left);
        assert_consistent(&registry);
    }

    #[test]
    fn test_leave_without_request_is_immediate() {
        let mut registry = RoomRegistry::new();
        let key = registry.open_or_join("chat");
        registry.acknowledge_join(RoomId(7), "chat").unwrap();
        drop(registry.get_mut(key).unwrap().subscribe());
        let mut rx = registry.get_mut(key).unwrap().subscribe();

        assert_eq!(registry.leave(key, false).unwrap(), LeaveOutcome::Left);
        assert_eq!(rx.try_recv().unwrap(), RoomEvent::Left);
        assert!(registry.is_empty());
        assert!(matches!(
            registry.leave(key, false),
            Err(RoomError::Detached(_))
        ));
    }

    #[test]
    fn test_leave_pending_room_is_local() {
        let mut registry = RoomRegistry::new();
        let key = registry.open_or_join("chat");
        assert_eq!(registry.leave(key, true).unwrap(), LeaveOutcome::Left);
        assert!(!registry.contains_name("chat"));
        assert_consistent(&registry);
    }

    #[test]
    fn test_close_all_leaves_everything() {
        let mut registry = RoomRegistry::new();
        let pending = registry.open_or_join("lobby");
        let joined = registry.open_or_join("chat");
        registry.acknowledge_join(RoomId(7), "chat").unwrap();
        let mut pending_rx = registry.get_mut(pending).unwrap().subscribe();
        let mut joined_rx = registry.get_mut(joined).unwrap().subscribe();

        assert_eq!(registry.close_all(), 2);

        assert!(registry.is_empty());
        assert_eq!(pending_rx.try_recv().unwrap(), RoomEvent::Left);
        assert_eq!(joined_rx.try_recv().unwrap(), RoomEvent::Joined { id: RoomId(7) });
        assert_eq!(joined_rx.try_recv().unwrap(), RoomEvent::Left);
        assert_consistent(&registry);
    }

    #[test]
    fn test_find_mut_routes_by_address_shape() {
        let mut registry = RoomRegistry::new();
        registry.open_or_join("chat");
        registry.acknowledge_join(RoomId(7), "chat").unwrap();

        assert!(registry.find_mut(&RoomAddress::Id(RoomId(7))).is_ok());
        // A numeric-looking name is still a name.
        assert!(registry.find_mut(&RoomAddress::from("7")).is_err());
        assert!(registry.find_mut(&RoomAddress::from("chat")).is_err());
    }
}
