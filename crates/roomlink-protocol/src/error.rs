//! Error types for the protocol layer.
//!
//! Each crate in Roomlink defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in turning bytes into a
//! message (or back), not in networking or room bookkeeping.

use crate::Opcode;

/// Errors that can occur in the protocol layer.
///
/// Every variant describes a frame that cannot be turned into a typed
/// message. The client drops such a frame and keeps processing the next
/// one; nothing here is fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a frame).
    ///
    /// Common causes: malformed JSON, or a frame that is not a JSON
    /// array at all.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates the framing rules, such as an empty
    /// array or a malformed argument.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A known opcode arrived without one of its required arguments.
    #[error("{opcode} frame is missing argument {position}")]
    MissingArgument {
        /// The opcode of the truncated frame.
        opcode: Opcode,
        /// Zero-based position in the frame (the opcode is position 0).
        position: usize,
    },

    /// A room address was neither an unsigned integer nor a string.
    #[error("invalid room address: {0}")]
    InvalidAddress(serde_json::Value),
}
