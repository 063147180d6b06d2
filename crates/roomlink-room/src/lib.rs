//! Room bookkeeping for Roomlink.
//!
//! The registry owns every room a connection knows about and routes wire
//! addresses to them. Each room mirrors its server state and fans its
//! lifecycle out to subscribers.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: owns rooms, performs the name→id re-key on join
//! - [`RoomRecord`]: one room and everything the client tracks about it
//! - [`RoomStatus`]: lifecycle state machine
//! - [`RoomEvent`] / [`EventBus`]: subscriber fan-out, with a bounded
//!   backlog for events raised before anyone subscribed

mod error;
mod events;
mod registry;
mod room;
mod status;

pub use error::RoomError;
pub use events::{EventBus, Replay, Retention, RoomEvent, BACKLOG_CAPACITY};
pub use registry::{LeaveOutcome, RoomKey, RoomRegistry};
pub use room::RoomRecord;
pub use status::RoomStatus;
