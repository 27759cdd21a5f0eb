//! Dotted JSON path helpers over [`serde_json::Value`].
//!
//! Paths are dot-separated segments; a segment that parses as an unsigned
//! integer indexes into an array, anything else is an object key. Examples:
//! `model`, `messages.0.content`, `choices.0.message.content`.
//!
//! Used by the route matcher (read) and the `field_map` transform (read +
//! write). Writing creates intermediate objects and array slots as needed.

use serde_json::Value;

/// Read the value at a dotted path. Returns `None` when any segment is absent
/// or the container kind does not match the segment.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `new_value` at a dotted path, creating intermediate objects (for
/// named segments) and null-padded arrays (for numeric segments) on the way.
/// A container of the wrong kind along the path is replaced.
pub fn set_path(root: &mut Value, path: &str, new_value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    insert(root, &segments, new_value);
}

fn insert(current: &mut Value, segments: &[&str], new_value: Value) {
    let (head, rest) = match segments.split_first() {
        Some(parts) => parts,
        None => {
            *current = new_value;
            return;
        }
    };

    match head.parse::<usize>() {
        Ok(index) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let items = current.as_array_mut().expect("array ensured above");
            while items.len() <= index {
                items.push(Value::Null);
            }
            insert(&mut items[index], rest, new_value);
        }
        Err(_) => {
            if !current.is_object() {
                *current = Value::Object(serde_json::Map::new());
            }
            let map = current.as_object_mut().expect("object ensured above");
            let slot = map.entry(head.to_string()).or_insert(Value::Null);
            insert(slot, rest, new_value);
        }
    }
}
