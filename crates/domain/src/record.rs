//! Records: the schemaless documents stored behind an automation.
//!
//! Every backend stores JSON objects. The `id` field is owned by the backend:
//! it is generated on create when the caller does not supply one.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A stored document.
pub type Record = Map<String, Value>;

/// Equality filters applied by `list` / `count` (field name → expected value).
pub type RecordFilter = BTreeMap<String, Value>;

/// Field under which every backend stores the record identifier.
pub const ID_FIELD: &str = "id";

/// Render a JSON scalar the way filters compare it.
///
/// Query strings carry every filter as text, so comparisons are done on the
/// textual form: `"5"` matches both `5` and `"5"`.
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Check whether `record` satisfies every equality in `filter`.
#[must_use]
pub fn matches_filter(record: &Record, filter: &RecordFilter) -> bool {
    filter.iter().all(|(field, expected)| {
        record
            .get(field)
            .is_some_and(|actual| value_text(actual) == value_text(expected))
    })
}

/// Read the record id as text, if present.
#[must_use]
pub fn record_id(record: &Record) -> Option<String> {
    record
        .get(ID_FIELD)
        .filter(|v| !v.is_null())
        .map(value_text)
}
