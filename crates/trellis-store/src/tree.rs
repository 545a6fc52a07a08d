//! Pure operations on an in-memory document tree.
//!
//! Backends load or lock a tree and delegate to these functions, so every
//! backend shares one definition of Replace, Merge and delete.

use serde_json::Map;
use trellis_types::{DocPath, Node, WriteMode};

use crate::error::{StoreError, StoreResult};

/// An empty root mapping.
pub fn empty_tree() -> Node {
    Node::Object(Map::new())
}

/// Resolve `path` against `root`. Numeric segments index into sequences.
pub fn get<'a>(root: &'a Node, path: &DocPath) -> Option<&'a Node> {
    let mut current = root;
    for segment in path.segments() {
        current = match current {
            Node::Object(map) => map.get(segment)?,
            Node::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        return None;
    }
    Some(current)
}

/// Shallow merge of `patch` into `target`.
///
/// Mapping onto mapping: keys of `patch` overwrite keys of `target`, and
/// `null` values remove the key. Any other combination replaces `target`.
pub fn merge_node(target: &mut Node, patch: Node) {
    match patch {
        Node::Object(fields) if target.is_object() => {
            if let Node::Object(existing) = target {
                for (key, value) in fields {
                    if value.is_null() {
                        existing.remove(&key);
                    } else {
                        existing.insert(key, value);
                    }
                }
            }
        }
        Node::Object(fields) => {
            *target = Node::Object(fields.into_iter().filter(|(_, v)| !v.is_null()).collect());
        }
        other => *target = other,
    }
}

/// Write `node` at `path` with the given mode.
///
/// The whole path is checked before anything is touched, so a rejected
/// write leaves the tree unchanged.
pub fn put(root: &mut Node, path: &DocPath, node: Node, mode: WriteMode) -> StoreResult<()> {
    if path.is_root() {
        return Err(StoreError::conflict(path, "cannot write the root node"));
    }
    if node.is_null() {
        return remove(root, path).map(|_| ());
    }
    check_writable(root, path)?;
    put_in(root, path.segments(), node, mode, path)
}

/// Remove the node at `path`. Returns `true` if something was removed.
pub fn remove(root: &mut Node, path: &DocPath) -> StoreResult<bool> {
    if path.is_root() {
        return Err(StoreError::conflict(path, "cannot delete the root node"));
    }
    remove_in(root, path.segments(), path)
}

fn check_writable(root: &Node, path: &DocPath) -> StoreResult<()> {
    let mut current = root;
    for segment in path.segments() {
        current = match current {
            Node::Null => return Ok(()),
            Node::Object(map) => match map.get(segment) {
                Some(child) => child,
                None => return Ok(()),
            },
            Node::Array(items) => {
                let index = parse_index(segment, path)?;
                items.get(index).ok_or_else(|| {
                    StoreError::conflict(
                        path,
                        format!("sequence index {index} out of range (len {})", items.len()),
                    )
                })?
            }
            _ => {
                return Err(StoreError::conflict(
                    path,
                    format!("path passes through a scalar at {segment:?}"),
                ))
            }
        };
    }
    Ok(())
}

fn put_in(
    node: &mut Node,
    segments: &[String],
    value: Node,
    mode: WriteMode,
    path: &DocPath,
) -> StoreResult<()> {
    let Some((head, rest)) = segments.split_first() else {
        apply(node, value, mode);
        return Ok(());
    };
    if node.is_null() {
        *node = empty_tree();
    }
    match node {
        Node::Object(map) => {
            let child = map.entry(head.clone()).or_insert(Node::Null);
            put_in(child, rest, value, mode, path)
        }
        Node::Array(items) => {
            let index = parse_index(head, path)?;
            let child = items
                .get_mut(index)
                .ok_or_else(|| StoreError::conflict(path, format!("sequence index {index} out of range")))?;
            put_in(child, rest, value, mode, path)
        }
        _ => Err(StoreError::conflict(path, "path passes through a scalar")),
    }
}

fn apply(slot: &mut Node, value: Node, mode: WriteMode) {
    match mode {
        WriteMode::Replace => *slot = value,
        WriteMode::Merge => merge_node(slot, value),
    }
}

fn remove_in(node: &mut Node, segments: &[String], path: &DocPath) -> StoreResult<bool> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(false);
    };
    match node {
        Node::Object(map) => {
            if rest.is_empty() {
                return Ok(map.remove(head).is_some());
            }
            let Some(child) = map.get_mut(head) else {
                return Ok(false);
            };
            let removed = remove_in(child, rest, path)?;
            if removed && is_empty_mapping(child) {
                map.remove(head);
            }
            Ok(removed)
        }
        Node::Array(items) => {
            if rest.is_empty() {
                return Err(StoreError::conflict(
                    path,
                    "cannot delete inside a sequence; rewrite the sequence instead",
                ));
            }
            let Some(child) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) else {
                return Ok(false);
            };
            remove_in(child, rest, path)
        }
        _ => Ok(false),
    }
}

fn parse_index(segment: &str, path: &DocPath) -> StoreResult<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| StoreError::conflict(path, format!("{segment:?} is not a sequence index")))
}

fn is_empty_mapping(node: &Node) -> bool {
    matches!(node, Node::Object(map) if map.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn p(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    #[test]
    fn merge_keeps_untouched_keys() {
        let mut tree = json!({"s": {"id1": {"x": 0, "y": 2}}});
        put(&mut tree, &p("s/id1"), json!({"x": 1}), WriteMode::Merge).unwrap();
        assert_eq!(get(&tree, &p("s/id1")), Some(&json!({"x": 1, "y": 2})));
    }

    #[test]
    fn replace_discards_previous_node() {
        let mut tree = json!({"s": {"id1": {"x": 0, "y": 2}}});
        put(&mut tree, &p("s/id1"), json!({"x": 1}), WriteMode::Replace).unwrap();
        assert_eq!(get(&tree, &p("s/id1")), Some(&json!({"x": 1})));
    }

    #[test]
    fn merge_null_removes_key() {
        let mut tree = json!({"a": {"x": 1, "y": 2}});
        put(&mut tree, &p("a"), json!({"x": null}), WriteMode::Merge).unwrap();
        assert_eq!(tree, json!({"a": {"y": 2}}));
    }

    #[test]
    fn replace_null_removes_node() {
        let mut tree = json!({"a": {"b": 1, "c": 2}});
        put(&mut tree, &p("a/b"), Node::Null, WriteMode::Replace).unwrap();
        assert_eq!(tree, json!({"a": {"c": 2}}));
    }

    #[test]
    fn intermediate_mappings_are_created() {
        let mut tree = empty_tree();
        put(&mut tree, &p("sponsors/gold/acme"), json!({"name": "Acme"}), WriteMode::Replace)
            .unwrap();
        assert_eq!(tree, json!({"sponsors": {"gold": {"acme": {"name": "Acme"}}}}));
    }

    #[test]
    fn scalar_in_path_is_a_conflict_and_tree_is_untouched() {
        let mut tree = json!({"a": 5});
        let before = tree.clone();
        let err = put(&mut tree, &p("a/b/c"), json!(1), WriteMode::Replace).unwrap_err();
        assert!(matches!(err, StoreError::ShapeConflict { .. }));
        assert_eq!(tree, before);
    }

    #[test]
    fn sequence_elements_are_addressable_by_index() {
        let mut tree = json!({"t": {"members": [{"n": "a"}, {"n": "b"}]}});
        assert_eq!(get(&tree, &p("t/members/1")), Some(&json!({"n": "b"})));
        assert_eq!(get(&tree, &p("t/members/2")), None);
        assert_eq!(get(&tree, &p("t/members/x")), None);

        put(&mut tree, &p("t/members/0"), json!({"r": 1}), WriteMode::Merge).unwrap();
        assert_eq!(get(&tree, &p("t/members/0")), Some(&json!({"n": "a", "r": 1})));

        let err = put(&mut tree, &p("t/members/5"), json!({}), WriteMode::Replace).unwrap_err();
        assert!(matches!(err, StoreError::ShapeConflict { .. }));
    }

    #[test]
    fn delete_inside_sequence_is_rejected() {
        let mut tree = json!({"t": {"members": [1, 2]}});
        let err = remove(&mut tree, &p("t/members/0")).unwrap_err();
        assert!(matches!(err, StoreError::ShapeConflict { .. }));
        assert_eq!(tree, json!({"t": {"members": [1, 2]}}));
    }

    #[test]
    fn delete_prunes_emptied_mappings() {
        let mut tree = json!({"sponsors": {"gold": {"acme": {"n": 1}}}, "other": 1});
        assert!(remove(&mut tree, &p("sponsors/gold/acme")).unwrap());
        assert_eq!(tree, json!({"other": 1}));
    }

    #[test]
    fn delete_absent_is_not_an_error() {
        let mut tree = json!({"a": {"b": 1}});
        assert!(!remove(&mut tree, &p("a/zzz")).unwrap());
        assert!(!remove(&mut tree, &p("nope/deeper")).unwrap());
        assert!(!remove(&mut tree, &p("a/b/c")).unwrap());
    }

    #[test]
    fn root_cannot_be_written_or_deleted() {
        let mut tree = empty_tree();
        assert!(put(&mut tree, &DocPath::root(), json!({}), WriteMode::Replace).is_err());
        assert!(remove(&mut tree, &DocPath::root()).is_err());
        assert_eq!(get(&tree, &DocPath::root()), Some(&empty_tree()));
    }

    proptest! {
        #[test]
        fn merge_preserves_keys_absent_from_patch(
            base in proptest::collection::btree_map("[a-e]", 0i64..100, 0..5),
            patch in proptest::collection::btree_map("[c-h]", 0i64..100, 0..5),
        ) {
            let mut target = json!(base);
            merge_node(&mut target, json!(patch));
            let merged = target.as_object().unwrap();
            for (k, v) in &base {
                if !patch.contains_key(k) {
                    prop_assert_eq!(merged.get(k), Some(&json!(v)));
                }
            }
            for (k, v) in &patch {
                prop_assert_eq!(merged.get(k), Some(&json!(v)));
            }
        }
    }
}
