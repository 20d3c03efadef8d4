//! Decode thread pool for image loads and adjacent-frame preloads.
//!
//! Uses work-stealing deques:
//! - New jobs go to the global injector, which workers poll before stealing
//! - Idle workers steal from each other
//!
//! Epoch mechanism drops queued jobs that belong to a closed event: jobs
//! enqueued with `execute_with_epoch()` are skipped at execution time if the
//! epoch moved on in the meantime.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool with work-stealing and a shared epoch counter.
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    current_epoch: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` decode threads (at least one).
    pub fn new(num_threads: usize, epoch: Arc<AtomicU64>) -> std::io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut locals: Vec<Worker<Job>> = Vec::with_capacity(num_threads);
        let mut stealers: Vec<Stealer<Job>> = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let worker: Worker<Job> = Worker::new_fifo();
            stealers.push(worker.stealer());
            locals.push(worker);
        }

        let mut handles = Vec::with_capacity(num_threads);
        for (worker_id, worker) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("rendercmp-loader-{}", worker_id))
                .spawn(move || worker_loop(worker_id, worker, &injector, &stealers, &shutdown))?;
            handles.push(handle);
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);

        Ok(Self {
            injector,
            handles,
            current_epoch: epoch,
            shutdown,
        })
    }

    /// Number of decode threads
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Run closure on a worker thread
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::Relaxed)
    }

    /// Run closure only if `epoch` is still current when a worker picks it up
    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let current_epoch = Arc::clone(&self.current_epoch);
        self.injector.push(Box::new(move || {
            if current_epoch.load(Ordering::Relaxed) == epoch {
                f();
            } else {
                trace!("Skipping job from epoch {}", epoch);
            }
        }));
    }
}

fn worker_loop(
    worker_id: usize,
    worker: Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
    shutdown: &AtomicBool,
) {
    trace!("Worker {} started", worker_id);
    loop {
        // 1. Own queue
        if let Some(job) = worker.pop() {
            job();
            continue;
        }

        // 2. Global injector (batch into own queue)
        if let Some(job) = injector.steal_batch_and_pop(&worker).success() {
            job();
            continue;
        }

        // 3. Other workers
        if let Some(job) = stealers.iter().find_map(|s| s.steal().success()) {
            job();
            continue;
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        // No work: short sleep instead of spinning
        thread::sleep(Duration::from_millis(1));
    }
    trace!("Worker {} stopped", worker_id);
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // A decode in progress is allowed to finish; give up after 500ms total
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped", num_threads);
    }
}
