//! Redis Pub/Sub subscriber.
//!
//! Keeps one pub/sub connection open, fans every received message out over a
//! broadcast channel and restores the wanted topic set after reconnecting.

use futures_util::StreamExt;
use parking_lot::RwLock;
use redis::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Subscriber is shut down")]
    ChannelClosed,
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Message received on a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub payload: String,
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Broadcast channel capacity
    pub broadcast_buffer: usize,
    /// Delay before reconnecting after a failure, in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

#[derive(Debug)]
enum Command {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Shutdown,
}

/// Topics the subscriber should be listening on
type Wanted = Arc<RwLock<HashSet<String>>>;

/// Redis Pub/Sub subscriber
pub struct Subscriber {
    wanted: Wanted,
    messages: broadcast::Sender<ReceivedMessage>,
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("topics", &self.wanted.read().len())
            .finish()
    }
}

impl Subscriber {
    /// Create a new subscriber and start the background listener
    ///
    /// The connection is established in the background, so this succeeds
    /// even while Redis is unreachable.
    #[must_use]
    pub fn new(config: SubscriberConfig) -> Self {
        let (messages, _) = broadcast::channel(config.broadcast_buffer.max(1));
        let (commands, command_rx) = mpsc::channel(64);
        let wanted: Wanted = Arc::new(RwLock::new(HashSet::new()));

        tokio::spawn(Self::listen(
            config,
            wanted.clone(),
            messages.clone(),
            command_rx,
        ));

        Self {
            wanted,
            messages,
            commands,
        }
    }

    async fn listen(
        config: SubscriberConfig,
        wanted: Wanted,
        messages: broadcast::Sender<ReceivedMessage>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let delay = Duration::from_millis(config.reconnect_delay_ms);
        loop {
            match Self::run_session(&config, &wanted, &messages, &mut commands).await {
                Ok(()) => {
                    tracing::info!("Subscriber shutting down");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, delay_ms = config.reconnect_delay_ms, "Subscriber connection lost, reconnecting");
                    if Self::wait_for_retry(delay, &mut commands).await {
                        tracing::info!("Subscriber shut down while disconnected");
                        break;
                    }
                }
            }
        }
    }

    /// Sleep out the reconnect delay while draining commands.
    ///
    /// Topic changes are already recorded in the wanted set and get applied on
    /// reconnect. Returns `true` on shutdown.
    async fn wait_for_retry(delay: Duration, commands: &mut mpsc::Receiver<Command>) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return false,
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => return true,
                    Some(_) => {}
                },
            }
        }
    }

    /// Run one connection until shutdown (`Ok`) or failure (`Err`)
    async fn run_session(
        config: &SubscriberConfig,
        wanted: &Wanted,
        messages: &broadcast::Sender<ReceivedMessage>,
        commands: &mut mpsc::Receiver<Command>,
    ) -> SubscriberResult<()> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        let topics: Vec<String> = wanted.read().iter().cloned().collect();
        for topic in &topics {
            pubsub.subscribe(topic).await?;
        }

        tracing::info!(topics = topics.len(), "Subscriber connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return Err(SubscriberError::Redis(redis::RedisError::from((
                            redis::ErrorKind::IoError,
                            "pub/sub stream ended",
                        ))));
                    };
                    let topic = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(topic = %topic, error = %e, "Dropping non-text pub/sub payload");
                            continue;
                        }
                    };
                    tracing::trace!(topic = %topic, "Received pub/sub message");
                    // No receivers is fine
                    let _ = messages.send(ReceivedMessage { topic, payload });
                }

                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Subscribe(topics)) => {
                            drop(stream);
                            for topic in &topics {
                                pubsub.subscribe(topic).await?;
                                tracing::debug!(topic = %topic, "Subscribed to topic");
                            }
                            stream = pubsub.on_message();
                        }
                        Some(Command::Unsubscribe(topics)) => {
                            drop(stream);
                            for topic in &topics {
                                pubsub.unsubscribe(topic).await?;
                                tracing::debug!(topic = %topic, "Unsubscribed from topic");
                            }
                            stream = pubsub.on_message();
                        }
                        Some(Command::Shutdown) | None => return Ok(()),
                    }
                }
            }
        }
    }

    async fn send(&self, command: Command) -> SubscriberResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    /// Subscribe to topics
    pub async fn subscribe(&self, topics: &[String]) -> SubscriberResult<()> {
        self.wanted.write().extend(topics.iter().cloned());
        self.send(Command::Subscribe(topics.to_vec())).await
    }

    /// Unsubscribe from topics
    pub async fn unsubscribe(&self, topics: &[String]) -> SubscriberResult<()> {
        {
            let mut wanted = self.wanted.write();
            for topic in topics {
                wanted.remove(topic);
            }
        }
        self.send(Command::Unsubscribe(topics.to_vec())).await
    }

    /// Get a receiver for incoming messages
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.messages.subscribe()
    }

    /// Topics currently wanted
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.wanted.read().iter().cloned().collect()
    }

    /// Stop the background listener
    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.send(Command::Shutdown).await
    }
}

/// Builder for subscriber
#[derive(Debug, Default)]
pub struct SubscriberBuilder {
    config: SubscriberConfig,
    initial_topics: Vec<String>,
}

impl SubscriberBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    #[must_use]
    pub fn broadcast_buffer(mut self, size: usize) -> Self {
        self.config.broadcast_buffer = size;
        self
    }

    #[must_use]
    pub fn reconnect_delay_ms(mut self, delay: u64) -> Self {
        self.config.reconnect_delay_ms = delay;
        self
    }

    /// Add a topic to subscribe to on start
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.initial_topics.push(topic.into());
        self
    }

    /// Build and start the subscriber
    pub async fn build(self) -> SubscriberResult<Subscriber> {
        let subscriber = Subscriber::new(self.config);
        if !self.initial_topics.is_empty() {
            subscriber.subscribe(&self.initial_topics).await?;
        }
        Ok(subscriber)
    }
}
