#![deny(clippy::all)]

//! Asset resolution on top of `stash-store`: availability gating, single and
//! bulk resolution, whole-cache population and the command layer used by the
//! `stash` binary.

mod bulk;
mod catalog;
mod commands;
mod config;
mod context;
mod gate;
mod outcome;
mod pool;
mod populate;
mod progress;
mod resolver;

pub use bulk::{BulkFetchReport, BulkFetcher, FetchObserver, ReportCounts};
pub use catalog::{load_catalog, AssetCatalog, AssetKind, CatalogEntry, CatalogSource};
pub use commands::{execute, StashCommand};
pub use config::{
    CacheConfig, Config, FetchConfig, DEFAULT_BUCKET, DEFAULT_CACHE_ROOT, DEFAULT_CONCURRENCY,
    DEFAULT_ENDPOINT, MAX_CONCURRENCY,
};
pub use context::AssetContext;
pub use gate::AvailabilityGate;
pub use outcome::{format_status_message, to_json_response, CommandStatus, ExecutionOutcome};
pub use pool::WorkerPool;
pub use populate::{CachePopulator, PopulateOutcome};
pub use resolver::{AbsenceReason, AssetResolver, FetchResult};

pub use stash_store::{AssetKey, LocalCache, MemoryStore, RemoteStore};
