//! Webhook notifications handed to the external delivery collaborator

use async_trait::async_trait;
use serde_json::Value;

use crate::entities::{App, WebhookEvent};

/// A notification that may be delivered to an app's webhooks
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookNotification {
    ClientEvent {
        channel: String,
        event: String,
        data: Value,
        socket_id: String,
        user_id: Option<String>,
    },
    ChannelOccupied {
        channel: String,
    },
    ChannelVacated {
        channel: String,
    },
    MemberAdded {
        channel: String,
        user_id: String,
    },
    MemberRemoved {
        channel: String,
        user_id: String,
    },
    CacheMiss {
        channel: String,
    },
}

impl WebhookNotification {
    #[must_use]
    pub fn event(&self) -> WebhookEvent {
        match self {
            Self::ClientEvent { .. } => WebhookEvent::ClientEvent,
            Self::ChannelOccupied { .. } => WebhookEvent::ChannelOccupied,
            Self::ChannelVacated { .. } => WebhookEvent::ChannelVacated,
            Self::MemberAdded { .. } => WebhookEvent::MemberAdded,
            Self::MemberRemoved { .. } => WebhookEvent::MemberRemoved,
            Self::CacheMiss { .. } => WebhookEvent::CacheMiss,
        }
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        match self {
            Self::ClientEvent { channel, .. }
            | Self::ChannelOccupied { channel }
            | Self::ChannelVacated { channel }
            | Self::MemberAdded { channel, .. }
            | Self::MemberRemoved { channel, .. }
            | Self::CacheMiss { channel } => channel,
        }
    }
}

/// Delivery side of webhooks. Callers check the app's trigger flags first.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, app: &App, notification: WebhookNotification);
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWebhookSender;

#[async_trait]
impl WebhookSender for NoopWebhookSender {
    async fn send(&self, _app: &App, _notification: WebhookNotification) {}
}
