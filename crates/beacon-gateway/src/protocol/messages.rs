//! Pusher message format
//!
//! Every frame is a JSON object with an `event` name and optional `channel`
//! and `data`. Some server events carry `data` as a JSON-encoded string, which
//! is how Pusher clients expect them.

use std::collections::BTreeMap;

use beacon_core::{DomainError, PresenceMember};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PING: &str = "pusher:ping";
pub const PONG: &str = "pusher:pong";
pub const SUBSCRIBE: &str = "pusher:subscribe";
pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";
pub const SIGNIN: &str = "pusher:signin";
pub const ERROR: &str = "pusher:error";
pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
pub const SUBSCRIPTION_ERROR: &str = "pusher:subscription_error";
pub const MEMBER_ADDED: &str = "pusher_internal:member_added";
pub const MEMBER_REMOVED: &str = "pusher_internal:member_removed";
pub const SIGNIN_SUCCESS: &str = "pusher:signin_success";
pub const CACHE_MISS: &str = "pusher:cache_miss";

/// Frame received from a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientMessage {
    pub event: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ClientMessage {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// `data` of `pusher:subscribe`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubscribeData {
    pub channel: String,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    channel_data: Option<Value>,
}

impl SubscribeData {
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    #[must_use]
    pub fn with_channel_data(mut self, channel_data: impl Into<String>) -> Self {
        self.channel_data = Some(Value::String(channel_data.into()));
        self
    }

    /// Raw presence payload exactly as it is signed
    ///
    /// Clients send it as a string; an object is accepted and re-serialized.
    #[must_use]
    pub fn channel_data(&self) -> Option<String> {
        match &self.channel_data {
            Some(Value::String(raw)) => Some(raw.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

/// `data` of `pusher:unsubscribe`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnsubscribeData {
    pub channel: String,
}

/// `data` of `pusher:signin`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigninData {
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub user_data: String,
}

/// Member list sent to a new presence subscriber
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PresenceData {
    pub ids: Vec<String>,
    pub hash: BTreeMap<String, Value>,
    pub count: usize,
}

impl PresenceData {
    #[must_use]
    pub fn from_members(members: BTreeMap<String, Value>) -> Self {
        Self {
            ids: members.keys().cloned().collect(),
            count: members.len(),
            hash: members,
        }
    }
}

/// Frame sent to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ServerMessage {
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            channel: None,
            data: None,
            user_id: None,
        }
    }

    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Carry `data` as a JSON-encoded string
    #[must_use]
    pub fn encoded_data(self, data: &Value) -> Self {
        self.data(Value::String(data.to_string()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    // === Server Messages ===

    #[must_use]
    pub fn connection_established(socket_id: &str, activity_timeout: u64) -> Self {
        Self::new(CONNECTION_ESTABLISHED).encoded_data(&json!({
            "socket_id": socket_id,
            "activity_timeout": activity_timeout,
        }))
    }

    #[must_use]
    pub fn pong() -> Self {
        Self::new(PONG).data(json!({}))
    }

    #[must_use]
    pub fn error(code: u16, message: impl Into<String>, channel: Option<&str>) -> Self {
        let message = Self::new(ERROR).data(json!({
            "code": code,
            "message": message.into(),
        }));
        match channel {
            Some(channel) => message.channel(channel),
            None => message,
        }
    }

    /// `pusher:error` for a domain rejection
    #[must_use]
    pub fn domain_error(err: &DomainError, channel: Option<&str>) -> Self {
        Self::error(err.code(), err.to_string(), channel)
    }

    #[must_use]
    pub fn subscription_succeeded(channel: &str) -> Self {
        Self::new(SUBSCRIPTION_SUCCEEDED)
            .channel(channel)
            .data(Value::String("{}".to_string()))
    }

    #[must_use]
    pub fn presence_subscription_succeeded(channel: &str, presence: &PresenceData) -> Self {
        Self::new(SUBSCRIPTION_SUCCEEDED)
            .channel(channel)
            .encoded_data(&json!({ "presence": presence }))
    }

    #[must_use]
    pub fn subscription_error(channel: &str, err: &DomainError) -> Self {
        Self::new(SUBSCRIPTION_ERROR).channel(channel).data(json!({
            "type": err.error_type(),
            "error": err.to_string(),
            "status": err.status(),
        }))
    }

    #[must_use]
    pub fn member_added(channel: &str, member: &PresenceMember) -> Self {
        Self::new(MEMBER_ADDED).channel(channel).encoded_data(&json!({
            "user_id": member.user_id,
            "user_info": member.user_info,
        }))
    }

    #[must_use]
    pub fn member_removed(channel: &str, user_id: &str) -> Self {
        Self::new(MEMBER_REMOVED)
            .channel(channel)
            .encoded_data(&json!({ "user_id": user_id }))
    }

    #[must_use]
    pub fn signin_success(data: Value) -> Self {
        Self::new(SIGNIN_SUCCESS).data(data)
    }

    #[must_use]
    pub fn cache_miss(channel: &str) -> Self {
        Self::new(CACHE_MISS).channel(channel)
    }

    /// Event relayed from a client or the REST API
    #[must_use]
    pub fn channel_event(
        event: impl Into<String>,
        channel: &str,
        data: Value,
        user_id: Option<String>,
    ) -> Self {
        Self {
            event: event.into(),
            channel: Some(channel.to_string()),
            data: Some(data),
            user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded_data(message: &ServerMessage) -> Value {
        let raw = message.data.as_ref().and_then(Value::as_str).unwrap();
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_parse_client_message() {
        let msg = ClientMessage::from_json(
            r#"{"event":"pusher:subscribe","data":{"channel":"presence-a","auth":"k:s","channel_data":"{\"user_id\":1}"}}"#,
        )
        .unwrap();
        assert_eq!(msg.event, SUBSCRIBE);
        assert!(msg.channel.is_none());

        let data: SubscribeData = serde_json::from_value(msg.data.unwrap()).unwrap();
        assert_eq!(data.channel, "presence-a");
        assert_eq!(data.auth.as_deref(), Some("k:s"));
        assert_eq!(data.channel_data().as_deref(), Some(r#"{"user_id":1}"#));
    }

    #[test]
    fn test_object_channel_data_is_serialized() {
        let data: SubscribeData = serde_json::from_value(json!({
            "channel": "presence-a",
            "channel_data": {"user_id": 1}
        }))
        .unwrap();
        assert_eq!(data.channel_data().as_deref(), Some(r#"{"user_id":1}"#));
    }

    #[test]
    fn test_connection_established_encodes_data() {
        let msg = ServerMessage::connection_established("1.2", 30);
        assert_eq!(decoded_data(&msg), json!({"socket_id": "1.2", "activity_timeout": 30}));
    }

    #[test]
    fn test_pong_wire_format() {
        assert_eq!(
            ServerMessage::pong().to_json().unwrap(),
            r#"{"event":"pusher:pong","data":{}}"#
        );
    }

    #[test]
    fn test_channel_event_field_order() {
        let msg = ServerMessage::channel_event("client-test", "test", json!({"test": true}), None);
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"event":"client-test","channel":"test","data":{"test":true}}"#
        );
    }

    #[test]
    fn test_subscription_error_fields() {
        let msg = ServerMessage::subscription_error("private-a", &DomainError::Unauthorized);
        assert_eq!(
            msg.data,
            Some(json!({
                "type": "AuthError",
                "error": "The connection is unauthorized.",
                "status": 401,
            }))
        );
    }

    #[test]
    fn test_presence_subscription_data() {
        let mut members = BTreeMap::new();
        members.insert("1".to_string(), json!({"name": "Ann"}));
        let msg = ServerMessage::presence_subscription_succeeded(
            "presence-a",
            &PresenceData::from_members(members),
        );
        assert_eq!(
            decoded_data(&msg),
            json!({"presence": {"ids": ["1"], "hash": {"1": {"name": "Ann"}}, "count": 1}})
        );
    }

    #[test]
    fn test_error_with_channel() {
        let msg = ServerMessage::domain_error(&DomainError::ClientMessagesDisabled, Some("test"));
        assert_eq!(msg.channel.as_deref(), Some("test"));
        assert_eq!(msg.data.as_ref().unwrap()["code"], 4301);
    }
}
