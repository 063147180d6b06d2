//! Error types for the state layer.

/// Errors raised while decoding or applying a patch.
///
/// A patch that fails leaves the mirrored state untouched: application
/// happens on a working copy that is only swapped in on success.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The patch document is not a list of patch operations.
    #[error("malformed patch document: {0}")]
    MalformedPatch(#[source] serde_json::Error),

    /// A path is not a valid JSON pointer.
    #[error("invalid pointer {0:?}")]
    InvalidPointer(String),

    /// The path (or one of its parents) does not exist in the state.
    #[error("path {0} not found")]
    PathNotFound(String),

    /// A path component addressing an array is not a valid index.
    #[error("invalid array index {index:?} in {path}")]
    InvalidIndex {
        /// The full path being resolved.
        path: String,
        /// The offending component.
        index: String,
    },

    /// An array index is past the end of the array.
    #[error("index {index} out of bounds (len {len}) in {path}")]
    IndexOutOfBounds {
        /// The full path being resolved.
        path: String,
        /// The requested index.
        index: usize,
        /// The array length at that point.
        len: usize,
    },

    /// A path walks into a scalar value.
    #[error("{0} does not point into an object or array")]
    NotAContainer(String),

    /// A `test` operation found a different value.
    #[error("test failed at {0}")]
    TestFailed(String),

    /// A `move` tried to put a value inside itself.
    #[error("cannot move {from} into its own child {path}")]
    MoveIntoChild {
        /// Source path.
        from: String,
        /// Destination path.
        path: String,
    },

    /// The whole document cannot be removed.
    #[error("cannot remove the document root")]
    RemoveRoot,
}
