use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use stash_store::{AssetKey, LocalCache, RemoteStore};

use crate::gate::AvailabilityGate;

/// Outcome of resolving one asset. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchResult {
    /// Served from the local cache without touching the remote store.
    Cached { path: PathBuf },
    /// Downloaded from the remote store during this resolution.
    Fetched { path: PathBuf },
    Absent { reason: AbsenceReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceReason {
    /// The availability gate was closed, so nothing was attempted.
    Unavailable,
    FetchFailed,
    /// The key would resolve outside the cache root.
    InvalidKey,
    /// The resolution never reported back, e.g. because it panicked.
    Interrupted,
}

impl FetchResult {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Cached { path } | Self::Fetched { path } => Some(path),
            Self::Absent { .. } => None,
        }
    }

    #[must_use]
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Cached { path } | Self::Fetched { path } => Some(path),
            Self::Absent { .. } => None,
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.path().is_some()
    }

    #[must_use]
    pub fn absence(&self) -> Option<AbsenceReason> {
        match self {
            Self::Absent { reason } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn absent(reason: AbsenceReason) -> Self {
        Self::Absent { reason }
    }
}

/// Resolves single assets against the cache, falling back to the remote store.
pub struct AssetResolver {
    cache: LocalCache,
    remote: Arc<dyn RemoteStore>,
    gate: AvailabilityGate,
}

impl AssetResolver {
    pub fn new(cache: LocalCache, remote: Arc<dyn RemoteStore>, gate: AvailabilityGate) -> Self {
        Self {
            cache,
            remote,
            gate,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Resolve `key` to a local path.
    ///
    /// A cached copy is returned without any remote call unless
    /// `force_refresh` is set. A forced refresh that cannot reach the remote
    /// store reports absence even if a stale copy exists on disk.
    pub fn resolve(&self, key: &AssetKey, force_refresh: bool) -> FetchResult {
        if !key.is_contained() {
            tracing::warn!(key = %key, "refusing key that does not map into the cache root");
            return FetchResult::absent(AbsenceReason::InvalidKey);
        }

        let path = self.cache.path_for(key);
        if !force_refresh && self.cache.exists(key) {
            tracing::trace!(key = %key, "cache hit");
            return FetchResult::Cached { path };
        }

        if !self.gate.is_available() {
            return FetchResult::absent(AbsenceReason::Unavailable);
        }

        if let Err(err) = self.cache.ensure_parent_dirs(key) {
            tracing::warn!(key = %key, error = %err, "failed to prepare cache directory");
            return FetchResult::absent(AbsenceReason::FetchFailed);
        }

        if self.remote.fetch(key, &path) {
            FetchResult::Fetched { path }
        } else {
            FetchResult::absent(AbsenceReason::FetchFailed)
        }
    }
}
