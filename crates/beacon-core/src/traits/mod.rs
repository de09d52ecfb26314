//! Ports implemented by the infrastructure crates

mod cache;
mod repositories;
mod webhooks;

pub use cache::{CacheEntry, CacheStore};
pub use repositories::{AppRepository, RepoResult};
pub use webhooks::{NoopWebhookSender, WebhookNotification, WebhookSender};
