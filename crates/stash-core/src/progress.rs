use std::env;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stash_store::AssetKey;

use crate::bulk::FetchObserver;
use crate::resolver::FetchResult;

pub(crate) fn progress_enabled() -> bool {
    match env::var("STASH_PROGRESS") {
        Ok(value) => value != "0",
        Err(_) => io::stderr().is_terminal(),
    }
}

/// Stderr progress line driven by a background ticker thread.
pub(crate) struct ProgressReporter {
    current: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    stop: Option<Arc<AtomicBool>>,
    handle: Option<thread::JoinHandle<()>>,
    enabled: bool,
}

impl ProgressReporter {
    pub(crate) fn new(label: impl Into<String>, enabled: bool) -> Self {
        let current = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));
        if !enabled {
            return Self {
                current,
                total,
                stop: None,
                handle: None,
                enabled: false,
            };
        }

        let label = label.into();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_current = Arc::clone(&current);
        let thread_total = Arc::clone(&total);
        let handle = thread::spawn(move || {
            ProgressReporter::run(&label, &thread_current, &thread_total, &thread_stop);
        });

        Self {
            current,
            total,
            stop: Some(stop),
            handle: Some(handle),
            enabled: true,
        }
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total, AtomicOrdering::Relaxed);
    }

    pub(crate) fn increment(&self) {
        self.current.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn finish(mut self, message: impl Into<String>) {
        if self.enabled {
            self.stop_ticker();
            self.enabled = false;
            eprintln!("stash ▸ {}", message.into());
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, AtomicOrdering::Relaxed);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = io::stderr().write_all(b"\r\x1b[2K");
        let _ = io::stderr().flush();
    }

    fn run(label: &str, current: &AtomicUsize, total: &AtomicUsize, stop: &AtomicBool) {
        const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let mut idx = 0;
        while !stop.load(AtomicOrdering::Relaxed) {
            let frame = FRAMES[idx % FRAMES.len()];
            idx += 1;
            let total = total.load(AtomicOrdering::Relaxed);
            let line = if total > 0 {
                let current = current.load(AtomicOrdering::Relaxed).min(total);
                format!("\r\x1b[2Kstash ▸ {label} [{current}/{total}] {frame}")
            } else {
                format!("\r\x1b[2Kstash ▸ {label} {frame}")
            };
            let _ = io::stderr().write_all(line.as_bytes());
            let _ = io::stderr().flush();
            thread::sleep(Duration::from_millis(80));
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if self.enabled {
            self.stop_ticker();
        }
    }
}

/// Feeds bulk fetch results into a [`ProgressReporter`].
pub(crate) struct ProgressObserver {
    reporter: ProgressReporter,
    absent: usize,
}

impl ProgressObserver {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self::with_enabled(label, progress_enabled())
    }

    pub(crate) fn with_enabled(label: impl Into<String>, enabled: bool) -> Self {
        Self {
            reporter: ProgressReporter::new(label, enabled),
            absent: 0,
        }
    }

    pub(crate) fn finish(self, message: impl Into<String>) {
        self.reporter.finish(message);
    }

    pub(crate) fn absent(&self) -> usize {
        self.absent
    }
}

impl FetchObserver for ProgressObserver {
    fn batch_started(&mut self, total: usize) {
        self.reporter.set_total(total);
    }

    fn asset_resolved(&mut self, key: &AssetKey, result: &FetchResult) {
        self.reporter.increment();
        if let Some(reason) = result.absence() {
            self.absent += 1;
            tracing::debug!(key = %key, ?reason, "asset absent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AbsenceReason;
    use std::path::PathBuf;

    #[test]
    fn observer_counts_absent_results() {
        let mut observer = ProgressObserver::with_enabled("fetching", false);
        observer.batch_started(2);
        observer.asset_resolved(
            &AssetKey::from("a.png"),
            &FetchResult::Fetched {
                path: PathBuf::from("a.png"),
            },
        );
        observer.asset_resolved(
            &AssetKey::from("b.png"),
            &FetchResult::Absent {
                reason: AbsenceReason::FetchFailed,
            },
        );
        assert_eq!(observer.absent(), 1);
        assert_eq!(observer.reporter.current.load(AtomicOrdering::Relaxed), 2);
        observer.finish("done");
    }
}
