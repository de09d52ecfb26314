//! In-process gossip
//!
//! Nodes created from the same [`LocalGossipNetwork`] share one broadcast
//! topic per namespace. Used for single-process deployments and for
//! exercising multi-node behavior in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::Announcement;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use super::{AnnouncementHandler, GossipResult, Gossiper};
use crate::connection::TimerHandle;

const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Shared hub that local gossipers publish through
#[derive(Clone)]
pub struct LocalGossipNetwork {
    topics: Arc<DashMap<String, broadcast::Sender<Announcement>>>,
    capacity: usize,
}

impl Default for LocalGossipNetwork {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }
}

impl LocalGossipNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// A gossiper attached to this network
    #[must_use]
    pub fn node(&self, node_id: impl Into<String>) -> LocalGossiper {
        LocalGossiper {
            node_id: node_id.into(),
            network: self.clone(),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn topic(&self, namespace: &str) -> broadcast::Sender<Announcement> {
        self.topics
            .entry(namespace.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

struct Listener {
    handler: Arc<RwLock<AnnouncementHandler>>,
    _task: TimerHandle,
}

/// One node's view of a [`LocalGossipNetwork`]
pub struct LocalGossiper {
    node_id: String,
    network: LocalGossipNetwork,
    listeners: Mutex<HashMap<String, Listener>>,
}

impl std::fmt::Debug for LocalGossiper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGossiper")
            .field("node_id", &self.node_id)
            .field("namespaces", &self.listeners.lock().len())
            .finish()
    }
}

impl LocalGossiper {
    async fn listen(
        node_id: String,
        namespace: String,
        mut receiver: broadcast::Receiver<Announcement>,
        handler: Arc<RwLock<AnnouncementHandler>>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(announcement) if announcement.node_id == node_id => {}
                Ok(announcement) => {
                    let handle = handler.read().clone();
                    handle(announcement).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(namespace = %namespace, lagged = n, "Gossip listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Namespaces this node is listening on
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        self.listeners.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl Gossiper for LocalGossiper {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn subscribe_to_namespace(
        &self,
        namespace: &str,
        handler: AnnouncementHandler,
    ) -> GossipResult<()> {
        let mut listeners = self.listeners.lock();
        if let Some(listener) = listeners.get(namespace) {
            *listener.handler.write() = handler;
            return Ok(());
        }

        let handler = Arc::new(RwLock::new(handler));
        let task = TimerHandle::spawn(Self::listen(
            self.node_id.clone(),
            namespace.to_string(),
            self.network.topic(namespace).subscribe(),
            handler.clone(),
        ));
        listeners.insert(
            namespace.to_string(),
            Listener {
                handler,
                _task: task,
            },
        );
        tracing::debug!(node_id = %self.node_id, namespace = %namespace, "Listening for gossip");
        Ok(())
    }

    async fn unsubscribe_from_namespace(&self, namespace: &str) -> GossipResult<()> {
        self.listeners.lock().remove(namespace);
        Ok(())
    }

    async fn announce(&self, announcement: Announcement) -> GossipResult<()> {
        let announcement = announcement.with_node_id(self.node_id.as_str());
        let topic = self.network.topic(&announcement.namespace);
        // No listeners yet is not a failure
        let _ = topic.send(announcement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{AnnouncementEvent, AnnouncementPayload};
    use futures::FutureExt;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn recorder() -> (AnnouncementHandler, mpsc::UnboundedReceiver<Announcement>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: AnnouncementHandler = Arc::new(move |announcement| {
            let _ = tx.send(announcement);
            async {}.boxed()
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn test_delivers_to_other_nodes_only() {
        let network = LocalGossipNetwork::new();
        let a = network.node("a");
        let b = network.node("b");
        let (handler_a, mut rx_a) = recorder();
        let (handler_b, mut rx_b) = recorder();
        a.subscribe_to_namespace("app-1", handler_a).await.unwrap();
        b.subscribe_to_namespace("app-1", handler_b).await.unwrap();

        a.announce_new_connection("app-1", "1.1").await;

        let received = tokio::time::timeout(Duration::from_secs(1), rx_b.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.node_id, "a");
        assert_eq!(received.event, AnnouncementEvent::ConnectionNew);
        assert_eq!(received.payload.connection_id.as_deref(), Some("1.1"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_order_is_preserved() {
        let network = LocalGossipNetwork::new();
        let a = network.node("a");
        let b = network.node("b");
        let (handler, mut rx) = recorder();
        b.subscribe_to_namespace("app-1", handler).await.unwrap();

        for i in 0..20 {
            a.announce_new_connection("app-1", &format!("{i}.0")).await;
        }
        for i in 0..20 {
            let received = rx.recv().await.unwrap();
            assert_eq!(received.payload.connection_id, Some(format!("{i}.0")));
        }
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_handler_and_unsubscribe_stops() {
        let network = LocalGossipNetwork::new();
        let a = network.node("a");
        let b = network.node("b");
        let (first, mut rx_first) = recorder();
        let (second, mut rx_second) = recorder();
        b.subscribe_to_namespace("app-1", first).await.unwrap();
        b.subscribe_to_namespace("app-1", second).await.unwrap();
        assert_eq!(b.namespaces(), vec!["app-1".to_string()]);

        a.announce_app_forget("app-1").await;
        assert!(rx_second.recv().await.is_some());
        assert!(rx_first.try_recv().is_err());

        b.unsubscribe_from_namespace("app-1").await.unwrap();
        assert!(b.namespaces().is_empty());
        a.announce_quietly("app-1", AnnouncementEvent::AppForget, AnnouncementPayload::default())
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx_second.try_recv().is_err());
    }
}
