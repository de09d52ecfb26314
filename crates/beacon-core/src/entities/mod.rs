//! Domain entities - core business objects

mod app;
mod channel;
mod presence;
mod user;

pub use app::{
    App, AppLimits, AppSchema, Webhook, WebhookEvent, WebhookFilter,
    DEFAULT_USER_AUTHENTICATION_TIMEOUT_MS,
};
pub use channel::{is_cache_channel, is_client_event, ChannelKind};
pub use presence::{user_id_from_value, PresenceMember};
pub use user::User;
