use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use stash_store::{LocalCache, RemoteStore};

use crate::bulk::{BulkFetchReport, BulkFetcher, FetchObserver};
use crate::gate::AvailabilityGate;
use crate::pool::WorkerPool;
use crate::resolver::AssetResolver;

/// Detailed result of mirroring the remote inventory into a cache root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PopulateOutcome {
    /// The cache root could not be created; nothing else was attempted.
    CacheRootUnavailable { root: PathBuf, error: String },
    RemoteUnavailable,
    /// The remote store is reachable but lists no assets.
    EmptyInventory,
    Completed { report: BulkFetchReport },
}

impl PopulateOutcome {
    /// Population succeeds only when every listed asset is present locally.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { report } if report.all_present())
    }

    #[must_use]
    pub fn report(&self) -> Option<&BulkFetchReport> {
        match self {
            Self::Completed { report } => Some(report),
            _ => None,
        }
    }
}

/// Mirrors the whole remote inventory into a local cache root.
pub struct CachePopulator {
    remote: Arc<dyn RemoteStore>,
    gate: AvailabilityGate,
    pool: Arc<WorkerPool>,
}

impl CachePopulator {
    pub fn new(remote: Arc<dyn RemoteStore>, concurrency: usize) -> Self {
        let gate = AvailabilityGate::new(Arc::clone(&remote));
        Self {
            remote,
            gate,
            pool: Arc::new(WorkerPool::new(concurrency)),
        }
    }

    /// All-or-nothing population of `cache_root`.
    ///
    /// Returns `true` only if every listed asset is now present locally. An
    /// unreachable store or an empty inventory both return `false`, telling
    /// the caller to use another asset source.
    pub fn populate(&self, cache_root: &Path) -> bool {
        self.populate_report(cache_root, false, &mut ()).is_success()
    }

    pub fn populate_report(
        &self,
        cache_root: &Path,
        force_refresh: bool,
        observer: &mut dyn FetchObserver,
    ) -> PopulateOutcome {
        let cache = LocalCache::new(cache_root);
        if let Err(err) = cache.ensure_root() {
            tracing::warn!(root = %cache_root.display(), error = %err, "failed to create cache root");
            return PopulateOutcome::CacheRootUnavailable {
                root: cache_root.to_path_buf(),
                error: err.to_string(),
            };
        }

        if !self.gate.is_available() {
            tracing::info!("remote store unavailable; cache not populated");
            return PopulateOutcome::RemoteUnavailable;
        }

        let keys = self.remote.list();
        if keys.is_empty() {
            tracing::info!("remote store lists no assets; cache not populated");
            return PopulateOutcome::EmptyInventory;
        }
        tracing::debug!(count = keys.len(), root = %cache_root.display(), "populating cache");

        let resolver = AssetResolver::new(cache, Arc::clone(&self.remote), self.gate.clone());
        let fetcher = BulkFetcher::with_pool(Arc::new(resolver), Arc::clone(&self.pool));
        let report = fetcher.fetch_all_observed(&keys, force_refresh, observer);

        let counts = report.counts();
        if report.all_present() {
            tracing::info!(
                cached = counts.cached,
                fetched = counts.fetched,
                "cache populated"
            );
        } else {
            tracing::warn!(
                absent = counts.absent,
                requested = counts.requested,
                "cache population incomplete"
            );
        }
        PopulateOutcome::Completed { report }
    }
}
