//! Local copy of a streamed path.
//!
//! The stream sends `put` (replace at a sub-path) and `patch` (merge
//! children at a sub-path) events relative to the subscribed path. The
//! mirror applies them so a full snapshot can be emitted after each one.

use serde_json::{Map, Value};

use crate::Snapshot;

/// Replaces the value at `path` with `data`. `null` deletes, and parents
/// left empty are removed.
pub fn put(root: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    put_at(root, &segments, data);
}

/// Merges each child of `data` into the value at `path`.
pub fn patch(root: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        put(root, path, data);
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        put(root, &format!("{base}/{key}"), value);
    }
}

fn put_at(node: &mut Value, segments: &[&str], data: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = data;
        return;
    };

    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(children) = node else {
        return;
    };

    let child = children
        .entry((*first).to_string())
        .or_insert(Value::Null);
    put_at(child, rest, data);

    let prune = child.is_null() || child.as_object().is_some_and(Map::is_empty);
    if prune {
        children.remove(*first);
    }
}

/// Converts a path value into a snapshot of its non-null children.
///
/// Collections whose keys are all small integers come back as arrays;
/// those are keyed by index.
#[must_use]
pub fn snapshot_from_value(value: Value) -> Snapshot {
    match value {
        Value::Object(children) => children
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Snapshot::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn root_put_replaces_everything() {
        let mut root = json!({"a": {"name": "old"}});
        put(&mut root, "/", json!({"b": {"name": "new"}}));
        assert_eq!(root, json!({"b": {"name": "new"}}));
    }

    #[test]
    fn child_put_and_delete() {
        let mut root = Value::Null;
        put(&mut root, "/-Nabc", json!({"name": "Plot A"}));
        put(&mut root, "/-Nabc/synced", json!(true));
        assert_eq!(root, json!({"-Nabc": {"name": "Plot A", "synced": true}}));

        put(&mut root, "/-Nabc", Value::Null);
        assert_eq!(root, json!({}));
    }

    #[test]
    fn deleting_last_field_prunes_record() {
        let mut root = json!({"r1": {"name": "x"}, "r2": {"name": "y"}});
        put(&mut root, "/r1/name", Value::Null);
        assert_eq!(root, json!({"r2": {"name": "y"}}));
    }

    #[test]
    fn patch_merges_children() {
        let mut root = json!({"r1": {"name": "x", "synced": false}});
        patch(&mut root, "/r1", json!({"synced": true, "notes": "ok"}));
        assert_eq!(
            root,
            json!({"r1": {"name": "x", "synced": true, "notes": "ok"}})
        );
    }

    #[test]
    fn snapshot_keys_arrays_by_index() {
        let snapshot = snapshot_from_value(json!([null, {"name": "one"}]));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["1"]["name"], "one");
        assert!(snapshot_from_value(Value::Null).is_empty());
    }
}
