//! Client facade for HTTP handlers.
//!
//! This module provides:
//! - `Client` - owns the store, configuration and profile registry
//! - `CollectionHandle` - per-collection accessor that plans, executes and pages
//!
//! # Example
//! ```ignore
//! let client = Client::connect("mongodb://localhost:27017", "listings", PlannerConfig::default()).await?;
//!
//! let page: PageResult<serde_json::Value> = client
//!     .collection("hotels")?
//!     .search(SearchQuery {
//!         q: Some("rooftop".into()),
//!         ..SearchQuery::default()
//!     })
//!     .await?;
//! ```

mod collection;

pub use collection::CollectionHandle;

use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::errors::PlannerError;
use crate::registry::ProfileRegistry;
use crate::runtime::{DocumentStore, MongoStore};
use crate::types::CollectionProfile;

/// Entry point tying a store to the planner configuration.
///
/// Cloning is cheap as long as the store is (both shipped stores are).
#[derive(Debug, Clone)]
pub struct Client<S> {
    store: S,
    config: Arc<PlannerConfig>,
    registry: Arc<ProfileRegistry>,
}

impl<S: DocumentStore> Client<S> {
    /// Validate `config` and build the profile registry from it.
    pub fn new(store: S, config: PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        let registry = ProfileRegistry::from_config(&config)?;
        Ok(Self {
            store,
            config: Arc::new(config),
            registry: Arc::new(registry),
        })
    }

    /// Handle for the named collection (profile name or collection name).
    pub fn collection(&self, name: &str) -> Result<CollectionHandle<'_, S>, PlannerError> {
        let profile = self.registry.resolve(name)?;
        Ok(CollectionHandle::new(&self.store, &self.config, profile))
    }

    pub fn profiles(&self) -> impl Iterator<Item = &CollectionProfile> {
        self.registry.iter()
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl Client<MongoStore> {
    /// Connect to MongoDB and build a client over `database`.
    pub async fn connect(uri: &str, database: &str, config: PlannerConfig) -> Result<Self, PlannerError> {
        let store = MongoStore::connect(uri, database).await?;
        Self::new(store, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MemoryStore;

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = PlannerConfig {
            max_page_size: 0,
            ..PlannerConfig::default()
        };
        let err = Client::new(MemoryStore::new(), config).expect_err("invalid config");
        assert!(matches!(err, PlannerError::Config { .. }));
    }

    #[test]
    fn collection_resolves_through_registry() {
        let client = Client::new(MemoryStore::new(), PlannerConfig::default()).expect("client");
        assert_eq!(client.collection("sports").expect("sports").profile().collection, "sports_facilities");
        assert!(matches!(
            client.collection("nope"),
            Err(PlannerError::UnknownCollection { .. })
        ));
        assert_eq!(client.profiles().count(), 5);
    }
}
