//! # Roomlink
//!
//! Client for room-based state-sync servers.
//!
//! A [`Client`] keeps one connection to a room server. Through it you join
//! named rooms; each [`Room`] mirrors the server's state for that room,
//! applying full snapshots and JSON patches as they arrive, and reports
//! what happened through event channels.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomlink::prelude::*;
//!
//! # async fn run() -> Result<(), RoomlinkError> {
//! let client = Client::builder()
//!     .endpoint("ws://127.0.0.1:2657")
//!     .build()
//!     .await?;
//! let room = client.join("chat", serde_json::Value::Null).await?;
//!
//! let mut events = room.events().await?;
//! while let Some(event) = events.recv().await {
//!     if let RoomEvent::Updated { state, .. } = event {
//!         println!("{state}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The protocol engine itself is the I/O-free [`Session`]; `Client` only
//! drives it from a reader task and a writer task.

mod client;
mod config;
mod error;
mod room;
mod session;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{ClientError, RoomlinkError};
pub use room::Room;
pub use session::{ClientEvent, Session};

/// Re-exports of the sub-crates, for callers that need lower-level types.
pub use roomlink_protocol as protocol;
pub use roomlink_room as rooms;
pub use roomlink_state as state;
pub use roomlink_transport as transport;

/// Convenience re-exports for common types.
///
/// ```rust
/// use roomlink::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Client, ClientBuilder, ClientConfig, ClientError, ClientEvent, Room,
        RoomlinkError,
    };
    pub use roomlink_protocol::{RoomAddress, RoomId};
    pub use roomlink_room::{RoomEvent, RoomStatus};
    pub use roomlink_state::{diff, Patch, PatchOp, RemoteClock};
    pub use roomlink_transport::{Connection, MemoryConnection, MemoryPeer};
}
