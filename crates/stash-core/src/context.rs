use std::sync::Arc;

use anyhow::{Context, Result};
use stash_store::{HttpObjectStore, LocalCache, RemoteStore};

use crate::bulk::BulkFetcher;
use crate::config::Config;
use crate::gate::AvailabilityGate;
use crate::populate::CachePopulator;
use crate::resolver::AssetResolver;

/// Everything a command needs: the configuration and one shared remote client.
///
/// Components are built on demand and all share the same remote store.
pub struct AssetContext {
    config: Config,
    remote: Arc<dyn RemoteStore>,
}

impl AssetContext {
    pub fn new(config: Config, remote: Arc<dyn RemoteStore>) -> Self {
        Self { config, remote }
    }

    /// Connect to the object store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or bucket cannot form a valid URL or
    /// the HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = HttpObjectStore::new(config.remote().clone()).with_context(|| {
            format!(
                "failed to configure remote store at {}",
                config.remote().endpoint
            )
        })?;
        tracing::debug!(bucket_url = %store.bucket_url(), "remote store configured");
        Ok(Self::new(config, Arc::new(store)))
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.remote)
    }

    #[must_use]
    pub fn gate(&self) -> AvailabilityGate {
        AvailabilityGate::new(self.remote())
    }

    #[must_use]
    pub fn cache(&self) -> LocalCache {
        LocalCache::new(self.config.cache().root.clone())
    }

    #[must_use]
    pub fn resolver(&self) -> AssetResolver {
        AssetResolver::new(self.cache(), self.remote(), self.gate())
    }

    #[must_use]
    pub fn fetcher(&self) -> BulkFetcher {
        BulkFetcher::new(self.resolver(), self.config.fetch().concurrency)
    }

    #[must_use]
    pub fn populator(&self) -> CachePopulator {
        CachePopulator::new(self.remote(), self.config.fetch().concurrency)
    }
}
