//! Mirrored room state for Roomlink.
//!
//! A room's state is an arbitrary JSON tree owned by the server. The
//! client receives it once in full and then as a stream of JSON patches;
//! this crate holds the pieces that keep the local copy in step:
//!
//! - [`Pointer`]: RFC 6901 paths into the tree
//! - [`Patch`] / [`PatchOp`]: RFC 6902 edit lists, applied transactionally
//! - [`diff`]: the patch between two trees
//! - [`StateMirror`]: the current state, the previous state, and the
//!   server clock of the last snapshot

mod diff;
mod error;
mod mirror;
mod patch;
mod pointer;

pub use diff::diff;
pub use error::StateError;
pub use mirror::{RemoteClock, StateMirror};
pub use patch::{Patch, PatchOp};
pub use pointer::Pointer;
