//! # beacon-common
//!
//! Shared utilities including configuration, error handling, token signing, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{body_md5, sign_request, string_to_sign, verify_request, Token};
pub use config::{
    AppConfig, AppSettings, CacheConfig, CacheDriver, ConfigError, ConnectionConfig, Environment,
    GossipConfig, GossipDriver, LogFormat, RedisConfig, ServerConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{
    try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError,
};
