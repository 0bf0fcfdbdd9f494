use std::sync::Arc;

use stash_store::RemoteStore;

/// Pre-flight reachability check consulted before any remote call.
#[derive(Clone)]
pub struct AvailabilityGate {
    remote: Arc<dyn RemoteStore>,
}

impl AvailabilityGate {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        let available = self.remote.probe();
        if !available {
            tracing::debug!("remote store unavailable; skipping remote call");
        }
        available
    }
}
