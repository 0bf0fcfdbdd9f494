use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size set of worker threads draining a shared job queue.
///
/// Workers live as long as the pool, so one pool serves any number of
/// batches. A panicking job is contained to that job; the worker keeps
/// draining. Dropping the pool closes the queue and joins every worker.
pub struct WorkerPool {
    jobs: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = (0..size)
            .map(|_| {
                let work_rx = Arc::clone(&job_rx);
                thread::spawn(move || loop {
                    let job = {
                        let guard = work_rx.lock().unwrap_or_else(PoisonError::into_inner);
                        match guard.recv() {
                            Ok(job) => job,
                            Err(_) => break,
                        }
                    };
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::warn!("worker job panicked");
                    }
                })
            })
            .collect();

        Self {
            jobs: Some(job_tx),
            workers,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job` for execution. Returns `false` if the pool has shut down.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.jobs {
            Some(jobs) => jobs.send(Box::new(job)).is_ok(),
            None => false,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.jobs.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
