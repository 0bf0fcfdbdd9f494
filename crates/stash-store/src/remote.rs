use std::path::Path;

use crate::AssetKey;

/// Capability over a key/blob object store.
///
/// Implementations absorb every transport failure: listing degrades to an
/// empty inventory, fetching and probing to `false`. Implementations must be
/// safe to call from several worker threads at once.
pub trait RemoteStore: Send + Sync {
    /// Every key currently in the store, in listing order.
    fn list(&self) -> Vec<AssetKey>;

    /// Copy the blob for `key` to `destination`.
    ///
    /// On failure no file is left at `destination`; an existing file there is
    /// only replaced by a complete download.
    fn fetch(&self, key: &AssetKey, destination: &Path) -> bool;

    /// Quick reachability check bounded by a short timeout.
    fn probe(&self) -> bool;
}
