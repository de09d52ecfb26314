//! Gateway server setup
//!
//! Builds the registry from configuration and serves the WebSocket, REST
//! and health routes.

mod handler;
mod response;
mod rest;
mod state;
mod webhooks;

pub use handler::gateway_handler;
pub use response::{ApiError, ApiResult, ErrorBody};
pub use rest::{health_check, publish_batch, publish_event, BatchEvents, PublishEvent};
pub use state::GatewayState;
pub use webhooks::LoggingWebhookSender;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use beacon_cache::{LocalCacheStore, RedisCacheStore, RedisPool, SubscriberConfig};
use beacon_common::{AppConfig, AppError, CacheDriver, GossipDriver, RedisConfig};
use beacon_core::{CacheStore, StaticAppRegistry};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::connection::{ConnectionRegistry, RegistrySettings};
use crate::gossip::{Gossiper, LocalGossipNetwork, RedisGossiper};

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/app/:app_key", get(gateway_handler))
        .route("/apps/:app_id/events", post(publish_event))
        .route("/apps/:app_id/batch_events", post(publish_batch))
        .route("/health", get(health_check))
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer())
        .with_state(state)
}

fn redis_pool(config: &AppConfig) -> Result<(RedisPool, &RedisConfig), AppError> {
    let redis = config
        .redis
        .as_ref()
        .ok_or_else(|| AppError::Config("REDIS_URL is required by the redis drivers".to_string()))?;
    tracing::info!("Connecting to Redis...");
    let pool = RedisPool::connect(redis).map_err(|e| AppError::Cache(e.to_string()))?;
    Ok((pool, redis))
}

fn create_gossiper(config: &AppConfig) -> Result<Arc<dyn Gossiper>, AppError> {
    let gossip = &config.gossip;
    match gossip.driver {
        GossipDriver::Local => {
            tracing::info!(node_id = %gossip.node_id, "Using in-process gossip");
            let network = LocalGossipNetwork::with_capacity(gossip.buffer);
            Ok(Arc::new(network.node(gossip.node_id.clone())))
        }
        GossipDriver::Redis => {
            let (pool, redis) = redis_pool(config)?;
            let subscriber = SubscriberConfig {
                redis_url: redis.url.clone(),
                broadcast_buffer: gossip.buffer,
                reconnect_delay_ms: gossip.reconnect_delay_ms,
            };
            tracing::info!(node_id = %gossip.node_id, prefix = %gossip.topic_prefix, "Using Redis gossip");
            Ok(Arc::new(RedisGossiper::new(
                pool,
                subscriber,
                gossip.topic_prefix.clone(),
                gossip.node_id.clone(),
            )))
        }
    }
}

fn create_cache(config: &AppConfig) -> Result<Arc<dyn CacheStore>, AppError> {
    match config.cache.driver {
        CacheDriver::Local => Ok(Arc::new(LocalCacheStore::new())),
        CacheDriver::Redis => {
            let (pool, _) = redis_pool(config)?;
            Ok(Arc::new(RedisCacheStore::new(pool)))
        }
    }
}

/// Initialize all dependencies and create `GatewayState`
///
/// Must be called inside a Tokio runtime.
pub fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    let apps = StaticAppRegistry::new(config.build_apps());
    tracing::info!(apps = apps.len(), "Apps loaded");

    let registry = ConnectionRegistry::builder(Arc::new(apps), create_gossiper(&config)?)
        .cache(create_cache(&config)?)
        .webhooks(Arc::new(LoggingWebhookSender))
        .settings(RegistrySettings::from_config(&config))
        .build();

    Ok(GatewayState::new(registry, config))
}

/// Run the gateway server on an already bound listener
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), AppError> {
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::Config(format!("Listener has no address: {e}")))?;
    tracing::info!("Gateway listening on ws://{}/app/{{key}}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.server.address();
    let state = create_gateway_state(config)?;
    let app = create_app(state);

    tracing::info!("Starting Gateway server on {}", addr);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    run_server(app, listener).await
}
