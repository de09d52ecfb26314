//! Application entity - one tenant's credentials, feature flags, and limits

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default deadline for `pusher:signin` when user authentication is enabled
pub const DEFAULT_USER_AUTHENTICATION_TIMEOUT_MS: u64 = 10_000;

/// Events a webhook can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    ClientEvent,
    ChannelOccupied,
    ChannelVacated,
    MemberAdded,
    MemberRemoved,
    CacheMiss,
}

/// Restricts a webhook to channels by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name_starts_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name_ends_with: Option<String>,
}

impl WebhookFilter {
    #[must_use]
    pub fn matches(&self, channel: &str) -> bool {
        let starts = self
            .channel_name_starts_with
            .as_deref()
            .is_none_or(|prefix| channel.starts_with(prefix));
        let ends = self
            .channel_name_ends_with
            .as_deref()
            .is_none_or(|suffix| channel.ends_with(suffix));
        starts && ends
    }
}

/// Webhook subscription. Delivery happens outside this crate; the record is
/// only consulted to decide whether a notification is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_function: Option<String>,
    pub event_types: Vec<WebhookEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<WebhookFilter>,
}

impl Webhook {
    /// Whether this webhook wants `event` for `channel`
    #[must_use]
    pub fn triggers_on(&self, event: WebhookEvent, channel: &str) -> bool {
        self.event_types.contains(&event)
            && self.filter.as_ref().is_none_or(|f| f.matches(channel))
    }
}

/// Numeric limits of an app. Negative rate and connection limits mean unlimited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppLimits {
    pub max_connections: i64,
    pub max_backend_events_per_second: i64,
    pub max_client_events_per_second: i64,
    pub max_read_requests_per_second: i64,
    pub max_presence_members_per_channel: usize,
    pub max_presence_member_size_in_kb: f64,
    pub max_channel_name_length: usize,
    pub max_event_channels_at_once: usize,
    pub max_event_name_length: usize,
    pub max_event_payload_in_kb: f64,
    pub max_event_batch_size: usize,
}

impl Default for AppLimits {
    fn default() -> Self {
        Self {
            max_connections: -1,
            max_backend_events_per_second: -1,
            max_client_events_per_second: -1,
            max_read_requests_per_second: -1,
            max_presence_members_per_channel: 100,
            max_presence_member_size_in_kb: 2.0,
            max_channel_name_length: 200,
            max_event_channels_at_once: 100,
            max_event_name_length: 200,
            max_event_payload_in_kb: 100.0,
            max_event_batch_size: 10,
        }
    }
}

/// Application entity
///
/// Records are shared as `Arc<App>` snapshots and never mutated once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct App {
    pub id: String,
    pub key: String,
    pub secret: String,
    pub enabled: bool,
    pub enable_client_messages: bool,
    pub enable_user_authentication: bool,
    pub user_authentication_timeout_ms: u64,
    pub enable_metrics: bool,
    pub limits: AppLimits,
    webhooks: Vec<Webhook>,
    webhook_flags: WebhookFlags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WebhookFlags {
    client_event: bool,
    channel_occupied: bool,
    channel_vacated: bool,
    member_added: bool,
    member_removed: bool,
    cache_miss: bool,
}

impl WebhookFlags {
    fn from_webhooks(webhooks: &[Webhook]) -> Self {
        let wants = |event| webhooks.iter().any(|w| w.event_types.contains(&event));
        Self {
            client_event: wants(WebhookEvent::ClientEvent),
            channel_occupied: wants(WebhookEvent::ChannelOccupied),
            channel_vacated: wants(WebhookEvent::ChannelVacated),
            member_added: wants(WebhookEvent::MemberAdded),
            member_removed: wants(WebhookEvent::MemberRemoved),
            cache_miss: wants(WebhookEvent::CacheMiss),
        }
    }
}

impl App {
    /// Create an app with default flags and limits
    #[must_use]
    pub fn new(id: impl Into<String>, key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            secret: secret.into(),
            enabled: true,
            enable_client_messages: false,
            enable_user_authentication: false,
            user_authentication_timeout_ms: DEFAULT_USER_AUTHENTICATION_TIMEOUT_MS,
            enable_metrics: false,
            limits: AppLimits::default(),
            webhooks: Vec::new(),
            webhook_flags: WebhookFlags::default(),
        }
    }

    /// Replace the webhook list, recomputing the trigger flags
    #[must_use]
    pub fn with_webhooks(mut self, webhooks: Vec<Webhook>) -> Self {
        self.webhook_flags = WebhookFlags::from_webhooks(&webhooks);
        self.webhooks = webhooks;
        self
    }

    #[must_use]
    pub fn webhooks(&self) -> &[Webhook] {
        &self.webhooks
    }

    #[inline]
    #[must_use]
    pub fn has_client_event_webhooks(&self) -> bool {
        self.webhook_flags.client_event
    }

    #[inline]
    #[must_use]
    pub fn has_channel_occupied_webhooks(&self) -> bool {
        self.webhook_flags.channel_occupied
    }

    #[inline]
    #[must_use]
    pub fn has_channel_vacated_webhooks(&self) -> bool {
        self.webhook_flags.channel_vacated
    }

    #[inline]
    #[must_use]
    pub fn has_member_added_webhooks(&self) -> bool {
        self.webhook_flags.member_added
    }

    #[inline]
    #[must_use]
    pub fn has_member_removed_webhooks(&self) -> bool {
        self.webhook_flags.member_removed
    }

    #[inline]
    #[must_use]
    pub fn has_cache_miss_webhooks(&self) -> bool {
        self.webhook_flags.cache_miss
    }

    /// Whether any webhook is registered for `event`
    #[must_use]
    pub fn has_webhooks_for(&self, event: WebhookEvent) -> bool {
        match event {
            WebhookEvent::ClientEvent => self.has_client_event_webhooks(),
            WebhookEvent::ChannelOccupied => self.has_channel_occupied_webhooks(),
            WebhookEvent::ChannelVacated => self.has_channel_vacated_webhooks(),
            WebhookEvent::MemberAdded => self.has_member_added_webhooks(),
            WebhookEvent::MemberRemoved => self.has_member_removed_webhooks(),
            WebhookEvent::CacheMiss => self.has_cache_miss_webhooks(),
        }
    }

    /// Client event rate limit, if one applies
    #[must_use]
    pub fn client_events_per_second(&self) -> Option<u32> {
        positive_limit(self.limits.max_client_events_per_second)
    }

    /// Backend (REST) event rate limit, if one applies
    #[must_use]
    pub fn backend_events_per_second(&self) -> Option<u32> {
        positive_limit(self.limits.max_backend_events_per_second)
    }

    /// Connection quota, if one applies
    #[must_use]
    pub fn connection_quota(&self) -> Option<usize> {
        usize::try_from(self.limits.max_connections).ok()
    }
}

fn positive_limit(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

/// App record as it appears in configuration. Absent fields fall back to
/// the defaults passed to [`AppSchema::into_app`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSchema {
    pub id: Option<String>,
    pub key: Option<String>,
    pub secret: Option<String>,
    pub enabled: Option<bool>,
    pub enable_client_messages: Option<bool>,
    pub enable_user_authentication: Option<bool>,
    pub user_authentication_timeout: Option<u64>,
    pub enable_metrics: Option<bool>,
    pub max_connections: Option<i64>,
    pub max_backend_events_per_second: Option<i64>,
    pub max_client_events_per_second: Option<i64>,
    pub max_read_requests_per_second: Option<i64>,
    pub max_presence_members_per_channel: Option<usize>,
    pub max_presence_member_size_in_kb: Option<f64>,
    pub max_channel_name_length: Option<usize>,
    pub max_event_channels_at_once: Option<usize>,
    pub max_event_name_length: Option<usize>,
    pub max_event_payload_in_kb: Option<f64>,
    pub max_event_batch_size: Option<usize>,
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
}

impl AppSchema {
    /// Build an immutable app record, filling gaps from `defaults`
    #[must_use]
    pub fn into_app(self, defaults: &AppLimits) -> App {
        let mut app = App::new(
            self.id.unwrap_or_else(|| "app-id".to_string()),
            self.key.unwrap_or_else(|| "app-key".to_string()),
            self.secret.unwrap_or_else(|| "app-secret".to_string()),
        );
        app.enabled = self.enabled.unwrap_or(true);
        app.enable_client_messages = self.enable_client_messages.unwrap_or(false);
        app.enable_user_authentication = self.enable_user_authentication.unwrap_or(false);
        app.user_authentication_timeout_ms = self
            .user_authentication_timeout
            .unwrap_or(DEFAULT_USER_AUTHENTICATION_TIMEOUT_MS);
        app.enable_metrics = self.enable_metrics.unwrap_or(false);
        app.limits = AppLimits {
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            max_backend_events_per_second: self
                .max_backend_events_per_second
                .unwrap_or(defaults.max_backend_events_per_second),
            max_client_events_per_second: self
                .max_client_events_per_second
                .unwrap_or(defaults.max_client_events_per_second),
            max_read_requests_per_second: self
                .max_read_requests_per_second
                .unwrap_or(defaults.max_read_requests_per_second),
            max_presence_members_per_channel: self
                .max_presence_members_per_channel
                .unwrap_or(defaults.max_presence_members_per_channel),
            max_presence_member_size_in_kb: self
                .max_presence_member_size_in_kb
                .unwrap_or(defaults.max_presence_member_size_in_kb),
            max_channel_name_length: self
                .max_channel_name_length
                .unwrap_or(defaults.max_channel_name_length),
            max_event_channels_at_once: self
                .max_event_channels_at_once
                .unwrap_or(defaults.max_event_channels_at_once),
            max_event_name_length: self
                .max_event_name_length
                .unwrap_or(defaults.max_event_name_length),
            max_event_payload_in_kb: self
                .max_event_payload_in_kb
                .unwrap_or(defaults.max_event_payload_in_kb),
            max_event_batch_size: self
                .max_event_batch_size
                .unwrap_or(defaults.max_event_batch_size),
        };
        app.with_webhooks(self.webhooks)
    }
}
