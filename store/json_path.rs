/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Path-scoped reads and edits over snapshot values.
//!
//! Segments address object fields by name and array elements by decimal
//! index. Every operation is shape-checked; a mismatch returns
//! `false`/`None` so callers degrade instead of corrupting state.

use serde_json::{Map, Value};

pub fn get_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut cursor = root;
    for segment in path {
        cursor = match cursor {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

fn get_path_mut<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut cursor = root;
    for segment in path {
        cursor = match cursor {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

/// Writes `value` at `path`, creating missing object fields along the
/// way. Refuses the empty path and out-of-bounds array segments.
pub fn set_path(root: &mut Value, path: &[String], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut cursor = root;
    for segment in parents {
        cursor = match cursor {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                match segment.parse::<usize>().ok().and_then(|index| items.get_mut(index)) {
                    Some(slot) => slot,
                    None => return false,
                }
            }
            _ => return false,
        };
    }
    match cursor {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items[index] = value;
                true
            }
            _ => false,
        },
        _ => false,
    }
}

pub fn delete_array_item(root: &mut Value, path: &[String], index: usize) -> bool {
    match get_path_mut(root, path) {
        Some(Value::Array(items)) if index < items.len() => {
            items.remove(index);
            true
        }
        _ => false,
    }
}

pub fn move_array_item(root: &mut Value, path: &[String], from: usize, to: usize) -> bool {
    match get_path_mut(root, path) {
        Some(Value::Array(items)) if from < items.len() && to < items.len() => {
            let item = items.remove(from);
            items.insert(to, item);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn segments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn get_path_traverses_objects_and_arrays() {
        let state = json!({"users": [{"name": "ada"}, {"name": "grace"}]});
        let value = get_path(&state, &segments(&["users", "1", "name"]));
        assert_eq!(value, Some(&json!("grace")));
    }

    #[test]
    fn get_path_rejects_shape_mismatches() {
        let state = json!({"count": 3});
        assert!(get_path(&state, &segments(&["count", "deep"])).is_none());
        assert!(get_path(&state, &segments(&["missing"])).is_none());
    }

    #[test]
    fn set_path_overwrites_and_creates_object_fields() {
        let mut state = json!({"user": {"role": "viewer"}});
        assert!(set_path(&mut state, &segments(&["user", "role"]), json!("admin")));
        assert!(set_path(&mut state, &segments(&["user", "flags", "beta"]), json!(true)));
        assert_eq!(state["user"]["role"], json!("admin"));
        assert_eq!(state["user"]["flags"]["beta"], json!(true));
    }

    #[test]
    fn set_path_refuses_empty_path_and_bad_indices() {
        let mut state = json!({"items": [1, 2]});
        assert!(!set_path(&mut state, &[], json!(0)));
        assert!(!set_path(&mut state, &segments(&["items", "9"]), json!(0)));
    }

    #[test]
    fn delete_and_move_reorder_arrays() {
        let mut state = json!({"items": ["a", "b", "c"]});
        assert!(move_array_item(&mut state, &segments(&["items"]), 0, 2));
        assert_eq!(state["items"], json!(["b", "c", "a"]));
        assert!(delete_array_item(&mut state, &segments(&["items"]), 1));
        assert_eq!(state["items"], json!(["b", "a"]));
        assert!(!delete_array_item(&mut state, &segments(&["items"]), 5));
    }
}
