//! In-process object store. Useful for tests and for exercising the cache
//! without a network.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;

use crate::{AssetKey, RemoteStore, PARTIAL_PREFIX, PARTIAL_SUFFIX};

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<IndexMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    fetch_delay: Mutex<Duration>,
    fetched: Mutex<Vec<AssetKey>>,
    probes: AtomicUsize,
    lists: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `(key, bytes)` pairs in listing order.
    pub fn with_objects<K, V>(objects: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let store = Self::new();
        for (key, bytes) in objects {
            store.insert(key, bytes);
        }
        store
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), bytes.into());
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make every fetch of `key` fail while it stays listed.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
    }

    /// Make every fetch of `key` panic.
    pub fn panic_on(&self, key: impl Into<String>) {
        self.panicking
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self
            .fetch_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of `fetch` calls that reached the store, successful or not.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn fetched_keys(&self) -> Vec<AssetKey> {
        self.fetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were running at the same time.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Total calls of any kind that reached the store.
    #[must_use]
    pub fn remote_calls(&self) -> usize {
        self.fetch_count() + self.probe_count() + self.list_count()
    }

    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    fn marked(set: &Mutex<HashSet<String>>, key: &AssetKey) -> bool {
        set.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key.as_str())
    }

    fn write_object(&self, key: &AssetKey, destination: &Path) -> std::io::Result<bool> {
        let Some(bytes) = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .cloned()
        else {
            return Ok(false);
        };
        let directory = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut partial = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(directory)?;
        partial.write_all(&bytes)?;
        partial.persist(destination).map_err(|err| err.error)?;
        Ok(true)
    }
}

impl RemoteStore for MemoryStore {
    fn list(&self) -> Vec<AssetKey> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if !self.is_available() {
            return Vec::new();
        }
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|key| AssetKey::new(key.clone()))
            .collect()
    }

    fn fetch(&self, key: &AssetKey, destination: &Path) -> bool {
        self.fetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let _release = InFlight(&self.in_flight);
        let delay = *self
            .fetch_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if Self::marked(&self.panicking, key) {
            panic!("memory store was told to panic on {key}");
        }
        if !self.is_available() || Self::marked(&self.failing, key) {
            return false;
        }
        match self.write_object(key, destination) {
            Ok(written) => written,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "memory store failed to write asset");
                false
            }
        }
    }

    fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.is_available()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
