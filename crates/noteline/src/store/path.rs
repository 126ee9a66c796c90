//! Key-path helpers for the document store.
//!
//! Documents live at `/`-separated paths such as `notes/1234/01HZX...`. Both
//! backends keep a flat map from path to JSON value; a read of an interior
//! path assembles the values stored beneath it into nested objects.

use serde_json::{Map, Value};

use super::{StoreError, StoreResult};

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// Characters that may not appear inside a single key.
const FORBIDDEN: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Check whether `key` can be used as a single path segment.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(|c| FORBIDDEN.contains(&c) || c.is_control())
}

/// Validate a full path.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPath`] if the path is empty or any segment is
/// not a valid key.
pub fn validate(path: &str) -> StoreResult<()> {
    if path.split(SEPARATOR).all(is_valid_key) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(path.to_string()))
    }
}

/// Join a parent path and a child key.
#[must_use]
pub fn join(parent: &str, key: &str) -> String {
    format!("{parent}{SEPARATOR}{key}")
}

/// Every strict ancestor of `path`, nearest last.
#[must_use]
pub fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices(SEPARATOR)
        .map(|(idx, _)| &path[..idx])
        .collect()
}

/// Check whether `path` is `root` or lies beneath it.
#[must_use]
pub fn is_within(path: &str, root: &str) -> bool {
    path == root
        || (path.len() > root.len()
            && path.starts_with(root)
            && path[root.len()..].starts_with(SEPARATOR))
}

/// Check whether a write at one path can change what is visible at the other.
#[must_use]
pub fn overlaps(a: &str, b: &str) -> bool {
    is_within(a, b) || is_within(b, a)
}

/// Half-open key range `[lower, upper)` covering every strict descendant of
/// `root` in byte order.
///
/// `'0'` is the code point right after `'/'`, so the range ends before any
/// sibling that merely shares the prefix.
#[must_use]
pub fn descendant_range(root: &str) -> (String, String) {
    (format!("{root}/"), format!("{root}0"))
}

/// Build the value visible at `root` from the entries stored at or below it.
///
/// Entries outside `root` are ignored. A value stored exactly at `root` wins
/// over anything beneath it.
#[must_use]
pub fn assemble(root: &str, entries: Vec<(String, Value)>) -> Option<Value> {
    let mut tree: Option<Map<String, Value>> = None;

    for (path, value) in entries {
        if path == root {
            return Some(value);
        }
        if !is_within(&path, root) {
            continue;
        }
        let relative = &path[root.len() + 1..];
        let object = tree.get_or_insert_with(Map::new);
        insert_nested(object, relative, value);
    }

    tree.map(Value::Object)
}

/// Group the entries below `root` by their first relative segment.
///
/// Returns one `(key, value)` pair per direct child, in key order.
#[must_use]
pub fn group_children(root: &str, entries: Vec<(String, Value)>) -> Vec<(String, Value)> {
    let mut grouped: std::collections::BTreeMap<String, Vec<(String, Value)>> =
        std::collections::BTreeMap::new();

    for (path, value) in entries {
        if path == root || !is_within(&path, root) {
            continue;
        }
        let relative = &path[root.len() + 1..];
        let child = relative.split(SEPARATOR).next().unwrap_or(relative);
        grouped
            .entry(child.to_string())
            .or_default()
            .push((path, value));
    }

    grouped
        .into_iter()
        .filter_map(|(child, entries)| {
            let child_path = join(root, &child);
            assemble(&child_path, entries).map(|value| (child, value))
        })
        .collect()
}

fn insert_nested(object: &mut Map<String, Value>, relative: &str, value: Value) {
    match relative.split_once(SEPARATOR) {
        None => {
            object.insert(relative.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_nested(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_keys() {
        assert!(is_valid_key("1234"));
        assert!(is_valid_key("01HZX3Q9R2M4N5P6"));
        assert!(is_valid_key("note-1_a"));
    }

    #[test]
    fn test_invalid_keys() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key("a.b"));
        assert!(!is_valid_key("a#b"));
        assert!(!is_valid_key("$a"));
        assert!(!is_valid_key("[0]"));
        assert!(!is_valid_key("a\nb"));
    }

    #[test]
    fn test_validate_path() {
        assert!(validate("notes/1234/abc").is_ok());
        assert!(validate("users").is_ok());
        assert!(validate("").is_err());
        assert!(validate("notes//abc").is_err());
        assert!(validate("notes/1234/").is_err());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("notes/1234", "abc"), "notes/1234/abc");
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("notes/1234/abc"), vec!["notes", "notes/1234"]);
        assert!(ancestors("users").is_empty());
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("notes/1234", "notes/1234"));
        assert!(is_within("notes/1234/abc", "notes/1234"));
        assert!(!is_within("notes/12345", "notes/1234"));
        assert!(!is_within("notes", "notes/1234"));
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps("notes", "notes/1234"));
        assert!(overlaps("notes/1234/abc", "notes/1234"));
        assert!(!overlaps("notes/5678/abc", "notes/1234"));
        assert!(!overlaps("users/1234", "notes/1234"));
    }

    #[test]
    fn test_descendant_range_excludes_prefix_siblings() {
        let (lower, upper) = descendant_range("notes/1234");
        let inside = "notes/1234/abc".to_string();
        let sibling = "notes/12345/abc".to_string();
        assert!(inside >= lower && inside < upper);
        assert!(!(sibling >= lower && sibling < upper));
    }

    #[test]
    fn test_assemble_exact_value() {
        let value = assemble("users/1234", vec![("users/1234".to_string(), json!(true))]);
        assert_eq!(value, Some(json!(true)));
    }

    #[test]
    fn test_assemble_nested() {
        let entries = vec![
            ("notes/1234/a".to_string(), json!({"title": "A"})),
            ("notes/1234/b".to_string(), json!({"title": "B"})),
            ("notes/1234/c/deep".to_string(), json!(1)),
        ];
        let value = assemble("notes/1234", entries).unwrap();
        assert_eq!(
            value,
            json!({"a": {"title": "A"}, "b": {"title": "B"}, "c": {"deep": 1}})
        );
    }

    #[test]
    fn test_assemble_empty() {
        assert_eq!(assemble("notes/1234", Vec::new()), None);
    }

    #[test]
    fn test_group_children_in_key_order() {
        let entries = vec![
            ("notes/1234/b".to_string(), json!({"title": "B"})),
            ("notes/1234/a".to_string(), json!({"title": "A"})),
            ("notes/1234/c/x".to_string(), json!("deep")),
        ];
        let children = group_children("notes/1234", entries);
        let keys: Vec<&str> = children.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(children[2].1, json!({"x": "deep"}));
    }
}
