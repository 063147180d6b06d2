//! JSON Patch (RFC 6902) documents and their transactional application.
//!
//! The server describes each state change as an ordered list of
//! operations, each addressing a location in the state tree with a
//! [`Pointer`]. [`Patch::apply`] runs the whole list against a working
//! copy and only commits when every operation succeeded, so a bad patch
//! can never leave the mirror half-updated.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Pointer, StateError};

/// One structural edit.
///
/// Serialized with an `"op"` tag, exactly as JSON Patch documents are:
/// `{"op": "add", "path": "/messages/1", "value": "hi"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert into an array (shifting later elements) or set an object key.
    Add { path: Pointer, value: Value },
    /// Delete an existing location.
    Remove { path: Pointer },
    /// Overwrite an existing location.
    Replace { path: Pointer, value: Value },
    /// Remove from `from`, then add at `path`.
    Move { from: Pointer, path: Pointer },
    /// Add a copy of the value at `from` at `path`.
    Copy { from: Pointer, path: Pointer },
    /// Assert the value at `path` equals `value`.
    Test { path: Pointer, value: Value },
}

impl PatchOp {
    /// The location this operation writes to (or tests).
    pub fn path(&self) -> &Pointer {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

/// An ordered list of [`PatchOp`]s.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(pub Vec<PatchOp>);

impl Patch {
    /// Decodes a patch document as carried by a state-patch frame.
    ///
    /// Accepts the operation list either inline (a JSON array) or
    /// pre-serialized as a JSON string.
    ///
    /// # Errors
    /// `StateError::MalformedPatch` if the document is not a list of
    /// well-formed operations.
    pub fn from_document(document: Value) -> Result<Self, StateError> {
        match document {
            Value::String(text) => {
                serde_json::from_str(&text).map_err(StateError::MalformedPatch)
            }
            other => {
                serde_json::from_value(other).map_err(StateError::MalformedPatch)
            }
        }
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the patch has no operations.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[PatchOp] {
        &self.0
    }

    /// Appends every operation of `other` after this patch's operations.
    pub fn extend(&mut self, other: Patch) {
        self.0.extend(other.0);
    }

    /// Applies every operation to `target`, all or nothing.
    ///
    /// # Errors
    /// The first operation that fails; `target` is unchanged in that case.
    pub fn apply(&self, target: &mut Value) -> Result<(), StateError> {
        let mut working = target.clone();
        self.apply_in_place(&mut working)?;
        *target = working;
        Ok(())
    }

    /// Applies every operation directly to `doc`. On error `doc` is left
    /// partially modified; callers must pass a scratch copy.
    pub(crate) fn apply_in_place(&self, doc: &mut Value) -> Result<(), StateError> {
        for op in &self.0 {
            apply_op(doc, op)?;
        }
        Ok(())
    }
}

impl From<Vec<PatchOp>> for Patch {
    fn from(ops: Vec<PatchOp>) -> Self {
        Self(ops)
    }
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), StateError> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path).map(|_| ()),
        PatchOp::Replace { path, value } => {
            *resolve_mut(doc, path.tokens(), path)? = value.clone();
            Ok(())
        }
        PatchOp::Move { from, path } => {
            if from == path {
                // Still has to exist.
                resolve(doc, from)?;
                return Ok(());
            }
            if from.is_ancestor_of(path) {
                return Err(StateError::MoveIntoChild {
                    from: from.to_string(),
                    path: path.to_string(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOp::Copy { from, path } => {
            let value = resolve(doc, from)?.clone();
            add(doc, path, value)
        }
        PatchOp::Test { path, value } => {
            if resolve(doc, path)? == value {
                Ok(())
            } else {
                Err(StateError::TestFailed(path.to_string()))
            }
        }
    }
}

fn add(doc: &mut Value, path: &Pointer, value: Value) -> Result<(), StateError> {
    let Some((parent, last)) = path.split_last() else {
        *doc = value;
        return Ok(());
    };
    match resolve_mut(doc, parent, path)? {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = if last == "-" {
                items.len()
            } else {
                parse_index(last, path)?
            };
            if index > items.len() {
                return Err(StateError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(StateError::NotAContainer(path.to_string())),
    }
}

fn remove(doc: &mut Value, path: &Pointer) -> Result<Value, StateError> {
    let (parent, last) = path.split_last().ok_or(StateError::RemoveRoot)?;
    match resolve_mut(doc, parent, path)? {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| StateError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let index = parse_index(last, path)?;
            if index >= items.len() {
                return Err(StateError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(StateError::NotAContainer(path.to_string())),
    }
}

/// Walks `tokens` from the root; `path` is only used in error messages.
fn resolve_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    path: &Pointer,
) -> Result<&'a mut Value, StateError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| StateError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let index = parse_index(token, path)?;
                let len = items.len();
                items.get_mut(index).ok_or_else(|| {
                    StateError::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                        len,
                    }
                })?
            }
            _ => return Err(StateError::NotAContainer(path.to_string())),
        };
    }
    Ok(current)
}

fn resolve<'a>(doc: &'a Value, path: &Pointer) -> Result<&'a Value, StateError> {
    let mut current = doc;
    for token in path.tokens() {
        current = match current {
            Value::Object(map) => map
                .get(token)
                .ok_or_else(|| StateError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let index = parse_index(token, path)?;
                items.get(index).ok_or_else(|| StateError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                })?
            }
            _ => return Err(StateError::NotAContainer(path.to_string())),
        };
    }
    Ok(current)
}

/// Array indices are plain decimal with no sign and no leading zeros.
fn parse_index(token: &str, path: &Pointer) -> Result<usize, StateError> {
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !well_formed {
        return Err(StateError::InvalidIndex {
            path: path.to_string(),
            index: token.to_string(),
        });
    }
    token.parse().map_err(|_| StateError::InvalidIndex {
        path: path.to_string(),
        index: token.to_string(),
    })
}

// =========================================================================
// Tests
// =========================================================================
