//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use std::env;
use std::str::FromStr;

use beacon_core::{App, AppLimits, AppSchema};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub redis: Option<RedisConfig>,
    pub gossip: GossipConfig,
    pub cache: CacheConfig,
    pub connection: ConnectionConfig,
    /// Limits applied to apps that do not set their own
    pub limits: AppLimits,
    pub apps: Vec<AppSchema>,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Log output format; `Auto` follows the environment preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Auto,
    Pretty,
    Json,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Gossip transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GossipDriver {
    /// In-process only; a single node
    #[default]
    Local,
    /// Redis pub/sub between nodes
    Redis,
}

/// Gossip configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GossipConfig {
    #[serde(default)]
    pub driver: GossipDriver,
    /// Identity of this node; announcements carrying it are not delivered back
    pub node_id: String,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_gossip_buffer")]
    pub buffer: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// Cache store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    #[default]
    Local,
    Redis,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub driver: CacheDriver,
    /// How long the last event of a cache channel is kept
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

/// Per-connection timing and buffering
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Advertised to clients in `pusher:connection_established`
    #[serde(default = "default_activity_timeout_secs")]
    pub activity_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Delay between queuing a final error frame and closing the socket
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    /// Capacity of each connection's outbound queue
    #[serde(default = "default_connection_buffer")]
    pub buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            activity_timeout_secs: default_activity_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            close_grace_ms: default_close_grace_ms(),
            buffer: default_connection_buffer(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "beacon".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6001
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_topic_prefix() -> String {
    "beacon:gossip".to_string()
}

fn default_gossip_buffer() -> usize {
    1024
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_cache_ttl_seconds() -> u64 {
    1800 // 30 minutes
}

fn default_activity_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    120
}

fn default_close_grace_ms() -> u64 {
    100
}

fn default_connection_buffer() -> usize {
    256
}

fn default_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse an optional variable, failing on malformed values
fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(None),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(name) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue(name, raw)),
        },
        None => Ok(None),
    }
}

fn parse_choice<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    choices: &[(&str, T)],
) -> Result<Option<T>, ConfigError>
where
    T: Copy,
{
    match lookup(name) {
        Some(raw) => choices
            .iter()
            .find(|(label, _)| raw.trim().eq_ignore_ascii_case(label))
            .map(|(_, value)| Some(*value))
            .ok_or(ConfigError::InvalidValue(name, raw)),
        None => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable holds an invalid value or a selected
    /// driver lacks its connection settings
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let app = AppSettings {
            name: lookup("APP_NAME").unwrap_or_else(default_app_name),
            env: parse_choice(
                &lookup,
                "APP_ENV",
                &[
                    ("production", Environment::Production),
                    ("staging", Environment::Staging),
                    ("development", Environment::Development),
                ],
            )?
            .unwrap_or_else(default_env),
            log_format: parse_choice(
                &lookup,
                "LOG_FORMAT",
                &[
                    ("auto", LogFormat::Auto),
                    ("pretty", LogFormat::Pretty),
                    ("json", LogFormat::Json),
                ],
            )?
            .unwrap_or_default(),
        };

        let server = ServerConfig {
            host: lookup("HOST").unwrap_or_else(default_host),
            port: parse_var(&lookup, "PORT")?.unwrap_or_else(default_port),
        };

        let redis = match lookup("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: parse_var(&lookup, "REDIS_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_redis_max_connections),
            }),
            None => None,
        };

        let gossip = GossipConfig {
            driver: parse_choice(
                &lookup,
                "GOSSIP_DRIVER",
                &[("local", GossipDriver::Local), ("redis", GossipDriver::Redis)],
            )?
            .unwrap_or_default(),
            node_id: lookup("GOSSIP_NODE_ID").unwrap_or_else(default_node_id),
            topic_prefix: lookup("GOSSIP_TOPIC_PREFIX").unwrap_or_else(default_topic_prefix),
            buffer: parse_var(&lookup, "GOSSIP_BUFFER")?.unwrap_or_else(default_gossip_buffer),
            reconnect_delay_ms: parse_var(&lookup, "GOSSIP_RECONNECT_DELAY_MS")?
                .unwrap_or_else(default_reconnect_delay_ms),
        };

        let cache = CacheConfig {
            driver: parse_choice(
                &lookup,
                "CACHE_DRIVER",
                &[("local", CacheDriver::Local), ("redis", CacheDriver::Redis)],
            )?
            .unwrap_or_default(),
            ttl_seconds: parse_var(&lookup, "CACHE_TTL_SECONDS")?
                .unwrap_or_else(default_cache_ttl_seconds),
        };

        if redis.is_none()
            && (gossip.driver == GossipDriver::Redis || cache.driver == CacheDriver::Redis)
        {
            return Err(ConfigError::MissingVar("REDIS_URL"));
        }

        let connection = ConnectionConfig {
            activity_timeout_secs: parse_var(&lookup, "ACTIVITY_TIMEOUT_SECS")?
                .unwrap_or_else(default_activity_timeout_secs),
            idle_timeout_secs: parse_var(&lookup, "IDLE_TIMEOUT_SECS")?
                .unwrap_or_else(default_idle_timeout_secs),
            close_grace_ms: parse_var(&lookup, "CLOSE_GRACE_MS")?
                .unwrap_or_else(default_close_grace_ms),
            buffer: parse_var(&lookup, "CONNECTION_BUFFER")?
                .unwrap_or_else(default_connection_buffer),
        };

        let fallback = AppLimits::default();
        let limits = AppLimits {
            max_presence_members_per_channel: parse_var(&lookup, "PRESENCE_MAX_MEMBERS")?
                .unwrap_or(fallback.max_presence_members_per_channel),
            max_presence_member_size_in_kb: parse_var(&lookup, "PRESENCE_MAX_MEMBER_SIZE_KB")?
                .unwrap_or(fallback.max_presence_member_size_in_kb),
            max_channel_name_length: parse_var(&lookup, "CHANNEL_NAME_MAX_LENGTH")?
                .unwrap_or(fallback.max_channel_name_length),
            max_event_name_length: parse_var(&lookup, "EVENT_NAME_MAX_LENGTH")?
                .unwrap_or(fallback.max_event_name_length),
            max_event_payload_in_kb: parse_var(&lookup, "EVENT_PAYLOAD_MAX_KB")?
                .unwrap_or(fallback.max_event_payload_in_kb),
            max_event_batch_size: parse_var(&lookup, "EVENT_BATCH_MAX_SIZE")?
                .unwrap_or(fallback.max_event_batch_size),
            max_event_channels_at_once: parse_var(&lookup, "EVENT_MAX_CHANNELS_AT_ONCE")?
                .unwrap_or(fallback.max_event_channels_at_once),
            ..fallback
        };

        let apps = match lookup("APPS_JSON") {
            Some(raw) => serde_json::from_str::<Vec<AppSchema>>(&raw)
                .map_err(|e| ConfigError::InvalidValue("APPS_JSON", e.to_string()))?,
            None => vec![AppSchema {
                id: Some(lookup("DEFAULT_APP_ID").unwrap_or_else(|| "app-id".to_string())),
                key: Some(lookup("DEFAULT_APP_KEY").unwrap_or_else(|| "app-key".to_string())),
                secret: Some(
                    lookup("DEFAULT_APP_SECRET").unwrap_or_else(|| "app-secret".to_string()),
                ),
                enable_client_messages: parse_bool(&lookup, "DEFAULT_APP_ENABLE_CLIENT_MESSAGES")?,
                enable_user_authentication: parse_bool(
                    &lookup,
                    "DEFAULT_APP_ENABLE_USER_AUTHENTICATION",
                )?,
                user_authentication_timeout: parse_var(
                    &lookup,
                    "DEFAULT_APP_USER_AUTHENTICATION_TIMEOUT",
                )?,
                max_connections: parse_var(&lookup, "DEFAULT_APP_MAX_CONNECTIONS")?,
                max_backend_events_per_second: parse_var(
                    &lookup,
                    "DEFAULT_APP_MAX_BACKEND_EVENTS_PER_SECOND",
                )?,
                max_client_events_per_second: parse_var(
                    &lookup,
                    "DEFAULT_APP_MAX_CLIENT_EVENTS_PER_SECOND",
                )?,
                ..AppSchema::default()
            }],
        };

        Ok(Self {
            app,
            server,
            redis,
            gossip,
            cache,
            connection,
            limits,
            apps,
        })
    }

    /// Materialize the configured apps with the configured default limits
    #[must_use]
    pub fn build_apps(&self) -> Vec<App> {
        self.apps
            .iter()
            .cloned()
            .map(|schema| schema.into_app(&self.limits))
            .collect()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
