//! Repository traits (ports) - define the interface for application lookup
//!
//! The gateway resolves every namespace through this port, so the registry
//! can be backed by static configuration, a database, or a remote service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::App;
use crate::error::DomainError;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

#[async_trait]
pub trait AppRepository: Send + Sync {
    /// Find an app by its id (the namespace)
    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Arc<App>>>;

    /// Find an app by its public key
    async fn get_by_key(&self, key: &str) -> RepoResult<Option<Arc<App>>>;
}
