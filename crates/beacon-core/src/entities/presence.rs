//! Presence members - the identity a connection announces on a presence channel

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::value_objects::data_to_kilobytes;

/// A member of a presence channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMember {
    #[serde(deserialize_with = "deserialize_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub user_info: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
}

impl PresenceMember {
    #[must_use]
    pub fn new(user_id: impl Into<String>, user_info: Value) -> Self {
        Self {
            user_id: user_id.into(),
            user_info,
            socket_id: None,
        }
    }

    /// Decode the `channel_data` string sent with a presence subscription
    pub fn from_channel_data(channel_data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(channel_data)
    }

    /// Size of `user_info` in kilobytes
    #[must_use]
    pub fn info_size_kb(&self) -> f64 {
        data_to_kilobytes(&self.user_info)
    }
}

/// Normalize a user id given as string or number. Empty strings, zero, and
/// every other JSON type are rejected.
#[must_use]
pub fn user_id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn deserialize_user_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "user_id must be a string or number, got {other}"
        ))),
    }
}
