//! Gossip over Redis pub/sub
//!
//! Announcements are published as JSON on `"{prefix}:{namespace}"`. A single
//! pump task reads the subscriber's stream and routes each message to the
//! handler registered for its namespace.

use std::sync::Arc;

use async_trait::async_trait;
use beacon_cache::{Publisher, ReceivedMessage, RedisPool, Subscriber, SubscriberConfig, TopicNamer};
use beacon_core::Announcement;
use dashmap::DashMap;
use tokio::sync::broadcast;

use super::{AnnouncementHandler, GossipResult, Gossiper};
use crate::connection::TimerHandle;

type Handlers = Arc<DashMap<String, AnnouncementHandler>>;

/// Redis-backed [`Gossiper`]
pub struct RedisGossiper {
    node_id: String,
    publisher: Publisher,
    subscriber: Subscriber,
    topics: TopicNamer,
    handlers: Handlers,
    _pump: TimerHandle,
}

impl std::fmt::Debug for RedisGossiper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisGossiper")
            .field("node_id", &self.node_id)
            .field("namespaces", &self.handlers.len())
            .finish()
    }
}

impl RedisGossiper {
    /// Must be called inside a Tokio runtime
    #[must_use]
    pub fn new(
        pool: RedisPool,
        subscriber: SubscriberConfig,
        topic_prefix: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        let node_id = node_id.into();
        let topics = TopicNamer::new(topic_prefix);
        let subscriber = Subscriber::new(subscriber);
        let handlers: Handlers = Arc::new(DashMap::new());

        let pump = TimerHandle::spawn(Self::pump(
            node_id.clone(),
            topics.clone(),
            subscriber.receiver(),
            handlers.clone(),
        ));

        Self {
            node_id,
            publisher: Publisher::new(pool),
            subscriber,
            topics,
            handlers,
            _pump: pump,
        }
    }

    async fn pump(
        node_id: String,
        topics: TopicNamer,
        mut receiver: broadcast::Receiver<ReceivedMessage>,
        handlers: Handlers,
    ) {
        loop {
            match receiver.recv().await {
                Ok(message) => Self::route(&node_id, &topics, &handlers, message).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Gossip pump lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Gossip subscriber closed");
                    break;
                }
            }
        }
    }

    /// Stop the subscriber's background connection
    pub async fn shutdown(&self) {
        if let Err(e) = self.subscriber.shutdown().await {
            tracing::debug!(error = %e, "Gossip subscriber already stopped");
        }
    }

    async fn route(node_id: &str, topics: &TopicNamer, handlers: &Handlers, message: ReceivedMessage) {
        let Some(namespace) = topics.namespace_of(&message.topic) else {
            tracing::debug!(topic = %message.topic, "Message on a foreign topic");
            return;
        };

        let announcement = match Announcement::from_json(&message.payload) {
            Ok(announcement) => announcement,
            Err(e) => {
                tracing::warn!(topic = %message.topic, error = %e, "Undecodable announcement");
                return;
            }
        };
        if announcement.node_id == node_id {
            return;
        }

        // Clone out so the map shard is not held across the handler
        let handler = handlers.get(namespace).map(|entry| entry.value().clone());
        if let Some(handler) = handler {
            handler(announcement).await;
        }
    }
}

#[async_trait]
impl Gossiper for RedisGossiper {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn subscribe_to_namespace(
        &self,
        namespace: &str,
        handler: AnnouncementHandler,
    ) -> GossipResult<()> {
        let replaced = self.handlers.insert(namespace.to_string(), handler).is_some();
        if !replaced {
            self.subscriber.subscribe(&[self.topics.topic(namespace)]).await?;
        }
        Ok(())
    }

    async fn unsubscribe_from_namespace(&self, namespace: &str) -> GossipResult<()> {
        if self.handlers.remove(namespace).is_some() {
            self.subscriber.unsubscribe(&[self.topics.topic(namespace)]).await?;
        }
        Ok(())
    }

    async fn announce(&self, announcement: Announcement) -> GossipResult<()> {
        let announcement = announcement.with_node_id(self.node_id.as_str());
        let payload = announcement.to_json()?;
        self.publisher
            .publish(&self.topics.topic(&announcement.namespace), &payload)
            .await?;
        Ok(())
    }
}
