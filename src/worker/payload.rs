use crate::config::PayloadNormalization;
use serde_json::Value as JsonValue;

/// Replaces payloads matching the normalization policy with an empty ordered sequence.
pub fn normalize_payload(data: JsonValue, normalization: PayloadNormalization) -> JsonValue {
    let replace = match normalization {
        PayloadNormalization::Absent => data.is_null(),
        PayloadNormalization::Falsy => is_falsy(&data),
    };

    if replace {
        JsonValue::Array(vec![])
    } else {
        data
    }
}

/// Checks whether the value is falsy in the JavaScript sense. Objects and arrays are never falsy,
/// even when empty.
fn is_falsy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(value) => !value,
        JsonValue::Number(value) => value.as_f64().map_or(false, |value| value == 0.0),
        JsonValue::String(value) => value.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => false,
    }
}
