//! Announcements - cross-node events published on a namespace's gossip topic

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::PresenceMember;

/// Fixed vocabulary of gossip events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnouncementEvent {
    #[serde(rename = "connection:new")]
    ConnectionNew,
    #[serde(rename = "connection:eviction")]
    ConnectionEviction,
    #[serde(rename = "message:incoming")]
    MessageIncoming,
    #[serde(rename = "pusher:channel:subscribe")]
    ChannelSubscribe,
    #[serde(rename = "pusher:channel:unsubscribe")]
    ChannelUnsubscribe,
    #[serde(rename = "pusher:channel:broadcast")]
    ChannelBroadcast,
    #[serde(rename = "pusher:app:new")]
    AppNew,
    #[serde(rename = "pusher:app:forget")]
    AppForget,
}

impl AnnouncementEvent {
    pub const ALL: [Self; 8] = [
        Self::ConnectionNew,
        Self::ConnectionEviction,
        Self::MessageIncoming,
        Self::ChannelSubscribe,
        Self::ChannelUnsubscribe,
        Self::ChannelBroadcast,
        Self::AppNew,
        Self::AppForget,
    ];

    /// Wire name of the event
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionNew => "connection:new",
            Self::ConnectionEviction => "connection:eviction",
            Self::MessageIncoming => "message:incoming",
            Self::ChannelSubscribe => "pusher:channel:subscribe",
            Self::ChannelUnsubscribe => "pusher:channel:unsubscribe",
            Self::ChannelBroadcast => "pusher:channel:broadcast",
            Self::AppNew => "pusher:app:new",
            Self::AppForget => "pusher:app:forget",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for AnnouncementEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event-specific fields. Each event fills the subset it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excepting_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<PresenceMember>,
}

/// One gossip message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub namespace: String,
    /// Node that published the announcement; stamped by the transport
    #[serde(default)]
    pub node_id: String,
    pub event: AnnouncementEvent,
    #[serde(default)]
    pub payload: AnnouncementPayload,
}

impl Announcement {
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        event: AnnouncementEvent,
        payload: AnnouncementPayload,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            node_id: String::new(),
            event,
            payload,
        }
    }

    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
