//! The client-side mirror of one room's server-authoritative state.

use serde_json::Value;

use crate::{Patch, StateError};

/// Server clock values carried by the last full snapshot.
///
/// Only stored for now; nothing reconciles them against the local clock.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RemoteClock {
    /// The server's current time when the snapshot was taken.
    pub current_time: f64,
    /// Time elapsed on the server side, as reported with the snapshot.
    pub elapsed: f64,
}

/// Holds the mirrored state plus the state before the last patch.
///
/// The client never edits this tree on its own: it changes only through
/// [`replace`](Self::replace) (a full snapshot) and [`apply`](Self::apply)
/// (an incremental patch).
#[derive(Debug, Clone, Default)]
pub struct StateMirror {
    state: Value,
    previous: Option<Value>,
    clock: RemoteClock,
}

impl StateMirror {
    /// Creates an empty mirror (`null` state).
    pub fn new() -> Self {
        Self::default()
    }

    /// The current mirrored state.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// The state as it was before the most recent successful patch.
    pub fn previous_state(&self) -> Option<&Value> {
        self.previous.as_ref()
    }

    /// Clock values from the most recent snapshot.
    pub fn clock(&self) -> RemoteClock {
        self.clock
    }

    /// Replaces the whole state with a snapshot. Never merges.
    pub fn replace(&mut self, state: Value, clock: RemoteClock) {
        self.state = state;
        self.clock = clock;
    }

    /// Applies a patch, all or nothing.
    ///
    /// On success the pre-patch state becomes
    /// [`previous_state`](Self::previous_state).
    ///
    /// # Errors
    /// The first failing operation; the mirror is unchanged.
    pub fn apply(&mut self, patch: &Patch) -> Result<(), StateError> {
        let mut working = self.state.clone();
        patch.apply_in_place(&mut working)?;
        self.previous = Some(std::mem::replace(&mut self.state, working));
        tracing::trace!(ops = patch.len(), "patch applied to mirror");
        Ok(())
    }
}
