//! Redis Pub/Sub module.
//!
//! Carries gossip announcements between nodes, one topic per namespace.

mod publisher;
mod subscriber;
mod topics;

pub use publisher::Publisher;
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult,
};
pub use topics::{TopicNamer, DEFAULT_TOPIC_PREFIX};
