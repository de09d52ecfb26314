//! Gossip between nodes
//!
//! Each namespace has one topic. Nodes announce connection and channel
//! changes on it so every node can keep a view of remote occupancy and relay
//! broadcasts to its own sockets.

mod error;
mod local;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::{Announcement, AnnouncementEvent, AnnouncementPayload, PresenceMember};
use futures::future::BoxFuture;

use crate::protocol::ServerMessage;

pub use error::{GossipError, GossipResult};
pub use local::{LocalGossipNetwork, LocalGossiper};
pub use self::redis::RedisGossiper;

/// Callback invoked for every announcement received on a namespace
pub type AnnouncementHandler = Arc<dyn Fn(Announcement) -> BoxFuture<'static, ()> + Send + Sync>;

/// Announcement transport
///
/// Transports stamp outgoing announcements with their node id and never
/// hand a node its own announcements back.
#[async_trait]
pub trait Gossiper: Send + Sync {
    fn node_id(&self) -> &str;

    /// Start delivering a namespace's announcements to `handler`
    ///
    /// Subscribing again replaces the handler.
    async fn subscribe_to_namespace(
        &self,
        namespace: &str,
        handler: AnnouncementHandler,
    ) -> GossipResult<()>;

    async fn unsubscribe_from_namespace(&self, namespace: &str) -> GossipResult<()>;

    async fn announce(&self, announcement: Announcement) -> GossipResult<()>;

    /// Announce, logging instead of returning failures
    async fn announce_quietly(&self, namespace: &str, event: AnnouncementEvent, payload: AnnouncementPayload) {
        let announcement = Announcement::new(namespace, event, payload);
        if let Err(e) = self.announce(announcement).await {
            tracing::warn!(namespace = %namespace, event = %event, error = %e, "Gossip announce failed");
        }
    }

    async fn announce_app_new(&self, namespace: &str, app_id: &str, app_key: &str) {
        let payload = AnnouncementPayload {
            app_id: Some(app_id.to_string()),
            app_key: Some(app_key.to_string()),
            ..AnnouncementPayload::default()
        };
        self.announce_quietly(namespace, AnnouncementEvent::AppNew, payload).await;
    }

    async fn announce_app_forget(&self, namespace: &str) {
        self.announce_quietly(namespace, AnnouncementEvent::AppForget, AnnouncementPayload::default())
            .await;
    }

    async fn announce_new_connection(&self, namespace: &str, connection_id: &str) {
        let payload = AnnouncementPayload {
            connection_id: Some(connection_id.to_string()),
            ..AnnouncementPayload::default()
        };
        self.announce_quietly(namespace, AnnouncementEvent::ConnectionNew, payload).await;
    }

    async fn announce_eviction(&self, namespace: &str, connection_id: &str) {
        let payload = AnnouncementPayload {
            connection_id: Some(connection_id.to_string()),
            ..AnnouncementPayload::default()
        };
        self.announce_quietly(namespace, AnnouncementEvent::ConnectionEviction, payload)
            .await;
    }

    async fn announce_channel_subscription(
        &self,
        namespace: &str,
        connection_id: &str,
        channel: &str,
        member: Option<PresenceMember>,
    ) {
        let payload = AnnouncementPayload {
            connection_id: Some(connection_id.to_string()),
            channel: Some(channel.to_string()),
            member,
            ..AnnouncementPayload::default()
        };
        self.announce_quietly(namespace, AnnouncementEvent::ChannelSubscribe, payload).await;
    }

    async fn announce_channel_unsubscription(&self, namespace: &str, connection_id: &str, channel: &str) {
        let payload = AnnouncementPayload {
            connection_id: Some(connection_id.to_string()),
            channel: Some(channel.to_string()),
            ..AnnouncementPayload::default()
        };
        self.announce_quietly(namespace, AnnouncementEvent::ChannelUnsubscribe, payload)
            .await;
    }

    async fn announce_channel_broadcast(
        &self,
        namespace: &str,
        channel: &str,
        message: &ServerMessage,
        excepting_id: Option<&str>,
    ) {
        let message = match serde_json::to_value(message) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(namespace = %namespace, error = %e, "Failed to encode broadcast");
                return;
            }
        };
        let payload = AnnouncementPayload {
            channel: Some(channel.to_string()),
            excepting_id: excepting_id.map(str::to_string),
            message: Some(message),
            ..AnnouncementPayload::default()
        };
        self.announce_quietly(namespace, AnnouncementEvent::ChannelBroadcast, payload).await;
    }
}
