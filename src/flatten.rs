//! Flattening of JSON entity representations into selector/value pairs.
//!
//! Objects produce `.key` paths and arrays produce both an indexed path
//! (`.list[0]`) and a wildcard path (`.list[]`), so a selector such as
//! `.groups[]` matches every element of `groups`.

use serde_json::Value;

/// A flattened JSON document: scalar leaves keyed by selector path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    items: Vec<(String, Value)>,
}

impl Flattened {
    pub fn items(&self) -> &[(String, Value)] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All values stored under `selector`. A missing leading `.` is implied.
    pub fn get(&self, selector: &str) -> Vec<&Value> {
        let selector = selector.trim();
        let normalized;
        let key = if selector.starts_with('.') {
            selector
        } else {
            normalized = format!(".{selector}");
            normalized.as_str()
        };
        self.items
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }
}

/// Flatten a JSON value. Scalars at the root are stored under `.`.
pub fn flatten(value: &Value) -> Flattened {
    let mut items = Vec::new();
    match value {
        Value::Object(_) | Value::Array(_) => walk("", value, &mut items),
        scalar => items.push((".".to_string(), scalar.clone())),
    }
    Flattened { items }
}

fn walk(prefix: &str, value: &Value, items: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(&format!("{prefix}.{key}"), child, items);
            }
        }
        Value::Array(list) => {
            for (idx, child) in list.iter().enumerate() {
                walk(&format!("{prefix}[{idx}]"), child, items);
            }
            for child in list {
                walk(&format!("{prefix}[]"), child, items);
            }
        }
        scalar => items.push((prefix.to_string(), scalar.clone())),
    }
}
