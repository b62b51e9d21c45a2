//! Shape normalization for loosely typed service responses.
//!
//! # Design
//! The service collapses one-element collections into a bare object and
//! omits empty ones entirely. Every array-valued field (lists, task series,
//! task occurrences, tags) is read through `normalize_to_array`, which never
//! looks at the field name. Values are borrowed from the parsed envelope.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

/// Mapping from list id to list display name.
pub type ListMap = HashMap<String, String>;

/// View `value` as a sequence: absent or null is empty, an array yields its
/// elements, anything else is a one-element sequence.
pub fn normalize_to_array(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

/// Read a scalar field as a string. Numbers are accepted because the service
/// is not consistent about quoting ids.
pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Like `string_field`, but treats an empty string as absent.
pub(crate) fn non_empty_field(value: &Value, key: &str) -> Option<String> {
    string_field(value, key).filter(|s| !s.is_empty())
}

/// Fold a `rtm.lists.getList` envelope into a `ListMap`.
///
/// Entries without an id or a name are skipped; downstream they only leave
/// a list name unresolved.
pub fn build_list_map(envelope: &Value) -> ListMap {
    let lists = envelope.pointer("/rsp/lists").and_then(|l| l.get("list"));
    let mut map = ListMap::new();
    for list in normalize_to_array(lists) {
        match (non_empty_field(list, "id"), non_empty_field(list, "name")) {
            (Some(id), Some(name)) => {
                map.insert(id, name);
            }
            _ => debug!(entry = %list, "skipping list entry without id or name"),
        }
    }
    map
}
