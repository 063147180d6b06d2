//! Wire protocol for Roomlink.
//!
//! This crate defines the "language" the client and the room server speak:
//!
//! - **Types** ([`Opcode`], [`RoomId`], [`RoomAddress`]): the vocabulary
//!   every frame is built from.
//! - **Messages** ([`ServerMessage`], [`ClientMessage`]): typed views of
//!   the positional `[opcode, ...args]` frames.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while framing.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! layer. It doesn't know about rooms being joined or state being mirrored;
//! it only knows how to turn frames into messages and back.
//!
//! ```text
//! Transport (bytes) → Protocol (ServerMessage) → Room registry / state
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{describe_detail, ClientMessage, ServerMessage};
pub use types::{Opcode, RoomAddress, RoomId};
