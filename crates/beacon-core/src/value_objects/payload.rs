//! Payload sizing used by the event and presence limits

use serde_json::Value;

/// Byte size of a payload: UTF-8 length of a string, otherwise the length
/// of its JSON serialization
#[must_use]
pub fn data_to_bytes(data: &Value) -> usize {
    match data {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }
}

/// Payload size in kilobytes (1 KB = 1024 bytes)
#[must_use]
pub fn data_to_kilobytes(data: &Value) -> f64 {
    data_to_bytes(data) as f64 / 1024.0
}
