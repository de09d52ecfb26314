//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, CacheConfig, CacheDriver, ConfigError, ConnectionConfig,
    Environment, GossipConfig, GossipDriver, LogFormat, RedisConfig, ServerConfig,
};
