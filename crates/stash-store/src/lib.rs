//! Storage primitives for the asset cache: keys, the on-disk cache layout and
//! the remote object store client.

mod error;
mod http;
mod key;
mod local;
pub mod memory;
mod remote;
mod retry;

pub use error::StoreError;
pub use http::{Credentials, HttpObjectStore, RemoteConfig, TransportConfig};
pub use key::AssetKey;
pub use local::{CacheUsage, CachedFile, LocalCache};
pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use retry::Backoff;

const USER_AGENT: &str = concat!("stash-store/", env!("CARGO_PKG_VERSION"));

/// Prefix of the temporary files a download streams into before it is renamed
/// over its final path.
pub const PARTIAL_PREFIX: &str = ".stash-";
/// Suffix of in-flight download files.
pub const PARTIAL_SUFFIX: &str = ".part";
