//! Query string parsing
//!
//! Parses `application/x-www-form-urlencoded` query strings into a JSON object
//! so query and body input share one validator. Bracketed keys build nested
//! values the way browser uploaders send them:
//!
//! - `metadata[name]=a.png` becomes `{"metadata": {"name": "a.png"}}`
//! - `list[]=a&list[]=b` becomes `{"list": ["a", "b"]}`
//!
//! Later duplicates of a plain key overwrite earlier ones. Keys nested deeper
//! than [`MAX_KEY_DEPTH`] brackets are taken literally.

use serde_json::{Map, Value};

/// Deepest bracket nesting built into nested values
pub const MAX_KEY_DEPTH: usize = 2;

/// Parse a raw query string into a JSON object
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut params = Map::new();
    let Some(query) = query else {
        return params;
    };

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let (base, path) = split_key(&key);
        if base.is_empty() {
            continue;
        }

        let slot = params.entry(base.to_string()).or_insert(Value::Null);
        assign(slot, &path, value.into_owned());
    }

    params
}

/// Split `a[b][c]` into `a` and `["b", "c"]`
///
/// Keys with unbalanced brackets, or more than [`MAX_KEY_DEPTH`] segments, are
/// taken literally.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    if !key.ends_with(']') {
        return (key, Vec::new());
    }

    let inner = &key[open + 1..key.len() - 1];
    if inner.matches("][").count() >= MAX_KEY_DEPTH {
        return (key, Vec::new());
    }
    let segments: Vec<&str> = inner.split("][").collect();
    if segments.iter().any(|s| s.contains('[') || s.contains(']')) {
        return (key, Vec::new());
    }

    (&key[..open], segments)
}

fn assign(slot: &mut Value, path: &[&str], value: String) {
    let mut slot = slot;
    for segment in path {
        if segment.is_empty() {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
        } else if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }

        slot = match slot {
            Value::Array(items) => {
                items.push(Value::Null);
                let last = items.len() - 1;
                &mut items[last]
            }
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => return,
        };
    }
    *slot = Value::String(value);
}
