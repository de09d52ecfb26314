//! Gateway state
//!
//! Application state shared by the WebSocket and REST handlers.

use std::num::NonZeroU32;
use std::sync::Arc;

use beacon_common::AppConfig;
use beacon_core::{App, AppRepository};
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::connection::ConnectionRegistry;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    /// Connection registry for every namespace on this node
    registry: Arc<ConnectionRegistry>,
    /// Application configuration
    config: Arc<AppConfig>,
    /// Backend event budgets, one per app id
    backend_limiters: Arc<DashMap<String, Arc<DefaultDirectRateLimiter>>>,
}

impl GatewayState {
    pub fn new(registry: Arc<ConnectionRegistry>, config: AppConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            backend_limiters: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn apps(&self) -> &Arc<dyn AppRepository> {
        self.registry.apps()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Consume `events` from the app's backend budget
    ///
    /// Apps without a positive `max_backend_events_per_second` are unlimited.
    pub fn allow_backend_events(&self, app: &App, events: u32) -> bool {
        let (Some(per_second), Some(events)) = (
            app.backend_events_per_second().and_then(NonZeroU32::new),
            NonZeroU32::new(events),
        ) else {
            return true;
        };
        let limiter = self
            .backend_limiters
            .entry(app.id.clone())
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_second(per_second))))
            .clone();
        matches!(limiter.check_n(events), Ok(Ok(())))
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("config", &"AppConfig")
            .finish()
    }
}
