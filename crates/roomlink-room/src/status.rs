//! Room lifecycle state machine.

/// Where a room is in its client-side lifecycle.
///
/// ```text
/// Unjoined ──(join ack)──→ Joined ──(leave request)──→ Leaving
///    │                        │                           │
///    │ (join error,           │ (leave ack,               │ (leave ack,
///    │  local leave)          │  local leave)             │  close)
///    ▼                        ▼                           ▼
///   Left ◄────────────────── Left ◄────────────────────── Left
/// ```
///
/// - **Unjoined**: the join request is out, no id yet. Addressed by name.
/// - **Joined**: the server assigned an id. State messages apply.
/// - **Leaving**: a leave request is out. Trailing state messages still
///   apply until the server confirms.
/// - **Left**: terminal. The room is no longer in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomStatus {
    Unjoined,
    Joined,
    Leaving,
    Left,
}

impl RoomStatus {
    /// Returns `true` if snapshots and patches may be applied.
    pub fn accepts_state(&self) -> bool {
        matches!(self, Self::Joined | Self::Leaving)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Unjoined, Self::Joined)
                | (Self::Unjoined, Self::Left)
                | (Self::Joined, Self::Leaving)
                | (Self::Joined, Self::Left)
                | (Self::Leaving, Self::Left)
        )
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unjoined => write!(f, "Unjoined"),
            Self::Joined => write!(f, "Joined"),
            Self::Leaving => write!(f, "Leaving"),
            Self::Left => write!(f, "Left"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_valid_transitions() {
        assert!(RoomStatus::Unjoined.can_transition_to(RoomStatus::Joined));
        assert!(RoomStatus::Unjoined.can_transition_to(RoomStatus::Left));
        assert!(RoomStatus::Joined.can_transition_to(RoomStatus::Leaving));
        assert!(RoomStatus::Joined.can_transition_to(RoomStatus::Left));
        assert!(RoomStatus::Leaving.can_transition_to(RoomStatus::Left));
    }

    #[test]
    fn test_status_invalid_transitions() {
        assert!(!RoomStatus::Joined.can_transition_to(RoomStatus::Joined));
        assert!(!RoomStatus::Joined.can_transition_to(RoomStatus::Unjoined));
        assert!(!RoomStatus::Unjoined.can_transition_to(RoomStatus::Leaving));
        assert!(!RoomStatus::Left.can_transition_to(RoomStatus::Joined));
        assert!(!RoomStatus::Left.can_transition_to(RoomStatus::Left));
    }

    #[test]
    fn test_status_accepts_state() {
        assert!(!RoomStatus::Unjoined.accepts_state());
        assert!(RoomStatus::Joined.accepts_state());
        assert!(RoomStatus::Leaving.accepts_state());
        assert!(!RoomStatus::Left.accepts_state());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RoomStatus::Unjoined.to_string(), "Unjoined");
        assert_eq!(RoomStatus::Leaving.to_string(), "Leaving");
    }
}
