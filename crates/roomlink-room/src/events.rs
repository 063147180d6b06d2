//! Event fan-out to any number of subscribers.

use std::collections::VecDeque;

use roomlink_protocol::RoomId;
use roomlink_state::Patch;
use serde_json::Value;
use tokio::sync::mpsc;

/// How many [`Retention::Recent`] events a backlog holds before it starts
/// dropping the oldest.
pub const BACKLOG_CAPACITY: usize = 64;

/// Whether an event waits in a bus's backlog for the first subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Always kept. Lifecycle events, which fire a bounded number of times.
    Keep,
    /// Kept, but only the [`BACKLOG_CAPACITY`] most recent.
    Recent,
    /// Never kept.
    Drop,
}

/// An event that knows how a backlog should treat it.
pub trait Replay {
    fn retention(&self) -> Retention;
}

/// Something that happened to one room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// The server acknowledged the join and assigned `id`.
    Joined { id: RoomId },
    /// The server refused the join.
    Error { message: String, detail: Vec<Value> },
    /// The client is out of the room.
    Left,
    /// A patch was applied. Fires before the matching `Updated`.
    Patched(Patch),
    /// Application data addressed to this room.
    Data(Value),
    /// The mirrored state changed. `patch` is `None` for a full snapshot.
    Updated { state: Value, patch: Option<Patch> },
}

impl Replay for RoomEvent {
    fn retention(&self) -> Retention {
        match self {
            Self::Joined { .. } | Self::Error { .. } | Self::Left => Retention::Keep,
            Self::Patched(_) | Self::Data(_) => Retention::Recent,
            // Carries a full copy of the state; the room has it anyway.
            Self::Updated { .. } => Retention::Drop,
        }
    }
}

/// Events raised before anyone subscribed.
#[derive(Debug)]
struct Backlog<E> {
    events: VecDeque<E>,
    recent: usize,
    dropped: usize,
}

impl<E: Replay> Backlog<E> {
    fn new() -> Self {
        Self {
            events: VecDeque::new(),
            recent: 0,
            dropped: 0,
        }
    }

    fn push(&mut self, event: E) {
        match event.retention() {
            Retention::Drop => {
                self.dropped += 1;
                return;
            }
            Retention::Keep => {}
            Retention::Recent if self.recent < BACKLOG_CAPACITY => {
                self.recent += 1;
            }
            Retention::Recent => {
                let oldest = self
                    .events
                    .iter()
                    .position(|e| e.retention() == Retention::Recent);
                if let Some(index) = oldest {
                    self.events.remove(index);
                    self.dropped += 1;
                }
            }
        }
        self.events.push_back(event);
    }
}

/// A list of subscribers that each get a clone of every event.
///
/// Emission never blocks: each subscriber owns an unbounded queue, so the
/// message-processing loop hands events off in arrival order and moves on.
/// Subscribers whose receiver was dropped are pruned on the next emit.
#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Vec<mpsc::UnboundedSender<E>>,
    backlog: Option<Backlog<E>>,
}

impl<E: Clone + Replay> EventBus<E> {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            backlog: None,
        }
    }

    /// Creates a bus that holds events back until someone subscribes.
    ///
    /// The first [`subscribe`](Self::subscribe) call receives the backlog,
    /// then every new event; later subscribers only see new events. What
    /// the backlog holds is bounded by each event's [`Retention`]. Used
    /// where events can fire before the owner of a handle gets a chance to
    /// subscribe, such as a join ack racing the caller.
    pub fn buffered() -> Self {
        Self {
            subscribers: Vec::new(),
            backlog: Some(Backlog::new()),
        }
    }

    /// Registers a new subscriber. It sees every event emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(backlog) = self.backlog.take() {
            if backlog.dropped > 0 {
                tracing::debug!(
                    dropped = backlog.dropped,
                    "events dropped before the first subscriber"
                );
            }
            for event in backlog.events {
                // `rx` is still in hand, so this cannot fail.
                let _ = tx.send(event);
            }
        }
        self.subscribers.push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, or holds it back for the
    /// first one.
    pub fn emit(&mut self, event: E) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if let Some(backlog) = &mut self.backlog {
            backlog.push(event);
        }
    }

    /// Returns `true` if anyone has subscribed. Lets emitters skip building
    /// events that only a subscriber could use.
    pub fn is_observed(&self) -> bool {
        !self.subscribers.is_empty()
    }

    /// Number of subscribers still registered (including ones that went
    /// away since the last emit).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of events waiting for the first subscriber.
    pub fn backlog_len(&self) -> usize {
        self.backlog.as_ref().map_or(0, |b| b.events.len())
    }
}

impl<E: Clone + Replay> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
