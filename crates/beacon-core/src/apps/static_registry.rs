//! Application registry backed by a fixed list of apps

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::entities::App;
use crate::traits::{AppRepository, RepoResult};

#[derive(Debug, Default)]
struct AppIndex {
    by_id: HashMap<String, Arc<App>>,
    by_key: HashMap<String, Arc<App>>,
}

impl AppIndex {
    fn build(apps: Vec<App>) -> Self {
        let mut index = Self::default();
        for app in apps {
            let app = Arc::new(app);
            index.by_key.insert(app.key.clone(), Arc::clone(&app));
            index.by_id.insert(app.id.clone(), app);
        }
        index
    }
}

/// In-memory app registry
///
/// [`StaticAppRegistry::reload`] builds a new index and swaps it in, so
/// `Arc<App>` snapshots handed out earlier stay valid and unchanged.
#[derive(Debug, Default)]
pub struct StaticAppRegistry {
    index: RwLock<AppIndex>,
}

impl StaticAppRegistry {
    #[must_use]
    pub fn new(apps: Vec<App>) -> Self {
        Self {
            index: RwLock::new(AppIndex::build(apps)),
        }
    }

    /// Replace every app record
    pub fn reload(&self, apps: Vec<App>) {
        let index = AppIndex::build(apps);
        *self.index.write() = index;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AppRepository for StaticAppRegistry {
    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Arc<App>>> {
        Ok(self.index.read().by_id.get(id).cloned())
    }

    async fn get_by_key(&self, key: &str) -> RepoResult<Option<Arc<App>>> {
        Ok(self.index.read().by_key.get(key).cloned())
    }
}
