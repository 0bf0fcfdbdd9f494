use std::sync::{mpsc, Arc};

use indexmap::IndexMap;
use serde::Serialize;
use stash_store::AssetKey;

use crate::pool::WorkerPool;
use crate::resolver::{AbsenceReason, AssetResolver, FetchResult};

/// Callbacks invoked on the collecting thread while a batch drains.
pub trait FetchObserver {
    fn batch_started(&mut self, _total: usize) {}
    fn asset_resolved(&mut self, _key: &AssetKey, _result: &FetchResult) {}
}

impl FetchObserver for () {}

/// Per-key outcome of a batch. Holds exactly one entry per distinct input key,
/// in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BulkFetchReport {
    entries: IndexMap<AssetKey, FetchResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub requested: usize,
    pub cached: usize,
    pub fetched: usize,
    pub absent: usize,
}

impl BulkFetchReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FetchResult> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetKey, &FetchResult)> {
        self.entries.iter()
    }

    /// Whether every key resolved to a local path.
    #[must_use]
    pub fn all_present(&self) -> bool {
        self.entries.values().all(FetchResult::is_present)
    }

    pub fn absent_keys(&self) -> impl Iterator<Item = &AssetKey> {
        self.entries
            .iter()
            .filter(|(_, result)| !result.is_present())
            .map(|(key, _)| key)
    }

    #[must_use]
    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts {
            requested: self.entries.len(),
            ..ReportCounts::default()
        };
        for result in self.entries.values() {
            match result {
                FetchResult::Cached { .. } => counts.cached += 1,
                FetchResult::Fetched { .. } => counts.fetched += 1,
                FetchResult::Absent { .. } => counts.absent += 1,
            }
        }
        counts
    }
}

/// Drives the resolver over many keys on a bounded worker pool.
pub struct BulkFetcher {
    resolver: Arc<AssetResolver>,
    pool: Arc<WorkerPool>,
}

impl BulkFetcher {
    /// Build a fetcher with its own pool of `concurrency` workers.
    pub fn new(resolver: AssetResolver, concurrency: usize) -> Self {
        Self::with_pool(Arc::new(resolver), Arc::new(WorkerPool::new(concurrency)))
    }

    pub fn with_pool(resolver: Arc<AssetResolver>, pool: Arc<WorkerPool>) -> Self {
        Self { resolver, pool }
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.pool.size()
    }

    /// Resolve every key, preferring cached copies.
    pub fn fetch_all(&self, keys: &[AssetKey]) -> BulkFetchReport {
        self.fetch_all_observed(keys, false, &mut ())
    }

    /// Resolve every key and report each result to `observer` as it lands.
    ///
    /// All keys are queued up front; the call returns once every queued
    /// resolution has reported back or died. A resolution that never reports
    /// is recorded as [`AbsenceReason::Interrupted`].
    pub fn fetch_all_observed(
        &self,
        keys: &[AssetKey],
        force_refresh: bool,
        observer: &mut dyn FetchObserver,
    ) -> BulkFetchReport {
        let mut report = BulkFetchReport::default();
        let (result_tx, result_rx) = mpsc::channel();

        for key in keys {
            if report.entries.contains_key(key) {
                continue;
            }
            report
                .entries
                .insert(key.clone(), FetchResult::absent(AbsenceReason::Interrupted));

            let resolver = Arc::clone(&self.resolver);
            let result_tx = result_tx.clone();
            let key = key.clone();
            let queued = self.pool.execute(move || {
                let result = resolver.resolve(&key, force_refresh);
                let _ = result_tx.send((key, result));
            });
            if !queued {
                tracing::warn!("worker pool is shut down; remaining assets left unresolved");
                break;
            }
        }
        drop(result_tx);

        observer.batch_started(report.len());
        for (key, result) in result_rx {
            observer.asset_resolved(&key, &result);
            if let Some(slot) = report.entries.get_mut(&key) {
                *slot = result;
            }
        }

        for key in report.absent_keys() {
            tracing::debug!(key = %key, "asset unresolved");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AvailabilityGate;
    use stash_store::{LocalCache, MemoryStore, RemoteStore};
    use std::path::Path;
    use std::time::Duration;

    fn fetcher(root: &Path, store: &Arc<MemoryStore>, concurrency: usize) -> BulkFetcher {
        let remote: Arc<dyn RemoteStore> = store.clone();
        let resolver = AssetResolver::new(
            LocalCache::new(root),
            remote.clone(),
            AvailabilityGate::new(remote),
        );
        BulkFetcher::new(resolver, concurrency)
    }

    fn keys(raw: &[&str]) -> Vec<AssetKey> {
        raw.iter().copied().map(AssetKey::from).collect()
    }

    #[test]
    fn one_failing_key_does_not_affect_siblings() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::with_objects([("A", "a"), ("B", "b"), ("C", "c")]));
        store.fail_key("B");

        let report = fetcher(temp.path(), &store, 4).fetch_all(&keys(&["A", "B", "C"]));

        assert_eq!(report.len(), 3);
        assert_eq!(report.get("A").and_then(FetchResult::path), Some(temp.path().join("A").as_path()));
        assert_eq!(
            report.get("B").and_then(FetchResult::absence),
            Some(AbsenceReason::FetchFailed)
        );
        assert_eq!(report.get("C").and_then(FetchResult::path), Some(temp.path().join("C").as_path()));
        assert!(!report.all_present());
        Ok(())
    }

    #[test]
    fn panicking_resolution_is_isolated() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::with_objects([("A", "a"), ("B", "b"), ("C", "c")]));
        store.panic_on("B");

        let report = fetcher(temp.path(), &store, 1).fetch_all(&keys(&["A", "B", "C"]));

        assert_eq!(report.len(), 3);
        assert_eq!(
            report.get("B").and_then(FetchResult::absence),
            Some(AbsenceReason::Interrupted)
        );
        assert!(report.get("A").is_some_and(FetchResult::is_present));
        assert!(report.get("C").is_some_and(FetchResult::is_present));
        Ok(())
    }

    #[test]
    fn report_follows_input_order_and_dedupes() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::with_objects([("a", "1"), ("b", "2"), ("c", "3")]));
        store.set_fetch_delay(Duration::from_millis(2));

        let report = fetcher(temp.path(), &store, 3).fetch_all(&keys(&["c", "a", "c", "b"]));

        let order: Vec<_> = report.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(store.fetch_count(), 3);
        Ok(())
    }

    #[test]
    fn concurrency_never_exceeds_pool_size() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;
        let names: Vec<String> = (0..12).map(|i| format!("asset-{i}.png")).collect();
        let store = Arc::new(MemoryStore::with_objects(
            names.iter().map(|name| (name.clone(), name.clone())),
        ));
        store.set_fetch_delay(Duration::from_millis(10));
        let requested: Vec<AssetKey> = names.iter().map(|name| AssetKey::from(name.as_str())).collect();

        let report = fetcher(temp.path(), &store, 2).fetch_all(&requested);

        assert!(report.all_present());
        assert!(store.peak_concurrency() <= 2, "peak {}", store.peak_concurrency());
        Ok(())
    }

    #[test]
    fn cached_keys_are_counted_separately() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::with_objects([("a", "1"), ("b", "2")]));
        std::fs::write(temp.path().join("a"), b"1")?;

        let report = fetcher(temp.path(), &store, 2).fetch_all(&keys(&["a", "b"]));

        assert_eq!(
            report.counts(),
            ReportCounts {
                requested: 2,
                cached: 1,
                fetched: 1,
                absent: 0
            }
        );
        assert_eq!(store.fetched_keys(), keys(&["b"]));
        Ok(())
    }

    #[test]
    fn observer_sees_every_result() -> std::io::Result<()> {
        #[derive(Default)]
        struct Recorder {
            total: usize,
            seen: Vec<String>,
        }
        impl FetchObserver for Recorder {
            fn batch_started(&mut self, total: usize) {
                self.total = total;
            }
            fn asset_resolved(&mut self, key: &AssetKey, _result: &FetchResult) {
                self.seen.push(key.to_string());
            }
        }

        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::with_objects([("a", "1"), ("b", "2")]));
        let mut recorder = Recorder::default();

        fetcher(temp.path(), &store, 2).fetch_all_observed(&keys(&["a", "b"]), false, &mut recorder);

        recorder.seen.sort();
        assert_eq!(recorder.total, 2);
        assert_eq!(recorder.seen, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn empty_batch_returns_empty_report() {
        let store = Arc::new(MemoryStore::new());
        let report = fetcher(Path::new("unused"), &store, 4).fetch_all(&[]);
        assert!(report.is_empty());
        assert!(report.all_present());
        assert_eq!(store.remote_calls(), 0);
    }

    #[test]
    fn pool_is_reused_across_batches() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::with_objects([("a", "1"), ("b", "2")]));
        let fetcher = fetcher(temp.path(), &store, 2);

        assert!(fetcher.fetch_all(&keys(&["a"])).all_present());
        assert!(fetcher.fetch_all(&keys(&["a", "b"])).all_present());
        assert_eq!(fetcher.concurrency(), 2);
        assert_eq!(store.fetch_count(), 2);
        Ok(())
    }
}
