/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bounded, type-aware previews of host values.
//!
//! Host data can be arbitrarily deep and self-similar; previews are the
//! only rendering the crate ever ships downstream. Recursion is capped
//! by `depth` and strings by `string_cap`, so rendering always
//! terminates regardless of input shape.

use serde_json::Value;

const INLINE_ARRAY_MAX: usize = 3;
const INLINE_OBJECT_KEYS: usize = 3;

pub fn preview(value: &Value, depth: usize, string_cap: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => preview_string(text, string_cap),
        Value::Array(items) => preview_array(items, depth, string_cap),
        Value::Object(map) => preview_object(map, depth, string_cap),
    }
}

fn preview_string(text: &str, string_cap: usize) -> String {
    if looks_like_timestamp(text) {
        return text.to_string();
    }
    let mut shown: String = text.chars().take(string_cap).collect();
    if shown.len() < text.len() {
        shown.push('…');
    }
    format!("\"{shown}\"")
}

/// ISO-8601-ish date-time prefix check, e.g. `2026-08-05T09:30:00Z`.
fn looks_like_timestamp(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 11
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
        && bytes[10] == b'T'
}

fn preview_array(items: &[Value], depth: usize, string_cap: usize) -> String {
    if depth == 0 || items.len() > INLINE_ARRAY_MAX {
        return format!("Array({})", items.len());
    }
    let rendered: Vec<String> = items
        .iter()
        .map(|item| preview(item, depth - 1, string_cap))
        .collect();
    format!("[{}]", rendered.join(", "))
}

fn preview_object(
    map: &serde_json::Map<String, Value>,
    depth: usize,
    string_cap: usize,
) -> String {
    if map.contains_key("message") && map.contains_key("stack") {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return format!("Error({})", preview_string(message, string_cap));
    }
    if depth == 0 {
        return format!("{{…}} ({} keys)", map.len());
    }
    let mut parts: Vec<String> = map
        .iter()
        .take(INLINE_OBJECT_KEYS)
        .map(|(key, value)| format!("{key}: {}", preview(value, depth - 1, string_cap)))
        .collect();
    if map.len() > INLINE_OBJECT_KEYS {
        parts.push("…".to_string());
    }
    format!("{{{}}}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn preview_truncates_long_strings() {
        let rendered = preview(&json!("abcdefghij"), 3, 4);
        assert_eq!(rendered, "\"abcd…\"");
    }

    #[test]
    fn preview_passes_timestamps_through() {
        let rendered = preview(&json!("2026-08-05T09:30:00Z"), 3, 4);
        assert_eq!(rendered, "2026-08-05T09:30:00Z");
    }

    #[test]
    fn preview_summarizes_large_arrays_by_count() {
        let rendered = preview(&json!([1, 2, 3, 4, 5]), 3, 40);
        assert_eq!(rendered, "Array(5)");
    }

    #[test]
    fn preview_renders_small_arrays_inline() {
        let rendered = preview(&json!([1, "x"]), 3, 40);
        assert_eq!(rendered, "[1, \"x\"]");
    }

    #[test]
    fn preview_special_cases_error_like_objects() {
        let rendered = preview(
            &json!({"message": "boom", "stack": "at main"}),
            3,
            40,
        );
        assert_eq!(rendered, "Error(\"boom\")");
    }

    #[test]
    fn preview_terminates_on_deep_self_similar_nesting() {
        let mut value = json!({"leaf": true});
        for _ in 0..64 {
            value = json!({"next": value, "other": [value.clone()]});
        }
        let rendered = preview(&value, 3, 40);
        assert!(!rendered.is_empty());
        assert!(rendered.len() < 4_096);
    }

    #[test]
    fn preview_counts_keys_at_depth_zero() {
        let rendered = preview(&json!({"a": 1, "b": 2}), 0, 40);
        assert_eq!(rendered, "{…} (2 keys)");
    }
}
