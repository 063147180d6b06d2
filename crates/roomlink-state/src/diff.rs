//! Structural diff between two state trees.

use serde_json::Value;

use crate::{Patch, PatchOp, Pointer};

/// Computes a patch that turns `before` into `after`.
///
/// Objects are compared key by key and arrays index by index; a change
/// of type at some location becomes a single `replace`. Array shrinkage
/// removes from the tail backwards so every emitted index is valid at the
/// moment it is applied.
pub fn diff(before: &Value, after: &Value) -> Patch {
    let mut ops = Vec::new();
    diff_into(&mut ops, &Pointer::root(), before, after);
    Patch(ops)
}

fn diff_into(ops: &mut Vec<PatchOp>, path: &Pointer, before: &Value, after: &Value) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                match new.get(key) {
                    Some(new_value) => {
                        diff_into(ops, &path.child(key.as_str()), old_value, new_value);
                    }
                    None => ops.push(PatchOp::Remove {
                        path: path.child(key.as_str()),
                    }),
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(key) {
                    ops.push(PatchOp::Add {
                        path: path.child(key.as_str()),
                        value: new_value.clone(),
                    });
                }
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            let shared = old.len().min(new.len());
            for i in 0..shared {
                diff_into(ops, &path.child(i.to_string()), &old[i], &new[i]);
            }
            for (i, value) in new.iter().enumerate().skip(shared) {
                ops.push(PatchOp::Add {
                    path: path.child(i.to_string()),
                    value: value.clone(),
                });
            }
            for i in (shared..old.len()).rev() {
                ops.push(PatchOp::Remove {
                    path: path.child(i.to_string()),
                });
            }
        }
        _ => ops.push(PatchOp::Replace {
            path: path.clone(),
            value: after.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_round_trip(before: Value, after: Value) {
        let patch = diff(&before, &after);
        let mut doc = before;
        patch.apply(&mut doc).expect("diff must apply cleanly");
        assert_eq!(doc, after);
    }

    #[test]
    fn test_identical_values_produce_empty_patch() {
        let v = json!({"a": [1, 2, {"b": null}]});
        assert!(diff(&v, &v).is_empty());
    }

    #[test]
    fn test_appended_message_is_single_add() {
        let patch = diff(&json!({"messages": ["hello"]}), &json!({"messages": ["hello", "hi"]}));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "add", "path": "/messages/1", "value": "hi"}])
        );
    }

    #[test]
    fn test_shrinking_array_removes_from_tail() {
        let patch = diff(&json!([1, 2, 3, 4]), &json!([1]));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([
                {"op": "remove", "path": "/3"},
                {"op": "remove", "path": "/2"},
                {"op": "remove", "path": "/1"}
            ])
        );
    }

    #[test]
    fn test_type_change_is_replace() {
        let patch = diff(&json!({"a": [1]}), &json!({"a": {"x": 1}}));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "replace", "path": "/a", "value": {"x": 1}}])
        );
    }

    #[test]
    fn test_round_trips() {
        assert_round_trip(json!(null), json!({"a": 1}));
        assert_round_trip(json!({"a": 1, "b": 2}), json!({"b": 3, "c": [true]}));
        assert_round_trip(
            json!({"players": {"p1": {"x": 0, "y": 0}}, "turn": "p1"}),
            json!({"players": {"p1": {"x": 1, "y": 0}, "p2": {"x": 5, "y": 5}}, "turn": "p2"}),
        );
        assert_round_trip(json!({"a/b": {"~": 1}}), json!({"a/b": {"~": 2}}));
    }
}
