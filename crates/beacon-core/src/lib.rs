//! # beacon-core
//!
//! Domain layer containing apps, channel kinds, presence members, gossip
//! announcements, and the traits implemented by the infrastructure crates.
//! This crate has zero dependencies on infrastructure (Redis, web framework, etc.).

pub mod apps;
pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use apps::StaticAppRegistry;
pub use entities::{
    is_cache_channel, is_client_event, user_id_from_value, App, AppLimits, AppSchema,
    ChannelKind, PresenceMember, User, Webhook, WebhookEvent, WebhookFilter,
    DEFAULT_USER_AUTHENTICATION_TIMEOUT_MS,
};
pub use error::DomainError;
pub use events::{Announcement, AnnouncementEvent, AnnouncementPayload};
pub use traits::{
    AppRepository, CacheEntry, CacheStore, NoopWebhookSender, RepoResult, WebhookNotification,
    WebhookSender,
};
pub use value_objects::{data_to_bytes, data_to_kilobytes, SocketId};
