//! Asynchronous image fetch.
//!
//! A load request returns immediately; the decoded image comes back later as
//! a `LoadCompletion` on a channel drained by the event loop
//! (`Session::pump()`). Nothing here touches buffer state.
//!
//! `ImageFetcher` is the seam between the loading core and the disk: the
//! viewer uses `DiskFetcher` (worker pool + LRU cache), tests substitute a
//! recording fetcher and inject completions by hand in any order.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::buffer::ResourceRole;
use crate::core::frame_cache::FrameCache;
use crate::core::resolver::ImageLocator;
use crate::core::workers::Workers;
use crate::entities::{Frame, FrameError, Loader, VariantKind};

/// Identifies the buffer slot resource a load was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    /// Event generation the request belongs to
    pub epoch: u64,
    /// Window (variant) that issued the load
    pub window: VariantKind,
    /// Slot index inside the window's buffer pair
    pub slot: usize,
    pub role: ResourceRole,
    pub locator: ImageLocator,
}

impl LoadTicket {
    /// Frame number the request originated from
    pub fn frame(&self) -> i32 {
        self.locator.frame()
    }
}

/// Finished load, delivered back to the event loop
#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub result: Result<Arc<Frame>, FrameError>,
}

/// Issues loads; completions are delivered asynchronously.
pub trait ImageFetcher: Send + Sync {
    /// Start loading `ticket.locator`. Must not block.
    fn fetch(&self, ticket: LoadTicket);

    /// Warm the cache for `locator` without producing a completion.
    fn prefetch(&self, epoch: u64, locator: &ImageLocator);

    /// Start a new generation: queued work from older epochs is dropped.
    fn set_epoch(&self, epoch: u64);

    /// Forget cached images (event close / re-open).
    fn clear_cache(&self);
}

/// Disk-backed fetcher: cache lookup, otherwise decode on the worker pool.
pub struct DiskFetcher {
    workers: Workers,
    cache: Arc<FrameCache>,
    epoch: Arc<AtomicU64>,
    tx: Sender<LoadCompletion>,
}

impl DiskFetcher {
    /// Create fetcher with `threads` decode threads and a cache of
    /// `cache_capacity` images. Returns the completion receiver.
    pub fn new(threads: usize, cache_capacity: usize) -> std::io::Result<(Self, Receiver<LoadCompletion>)> {
        let epoch = Arc::new(AtomicU64::new(0));
        let workers = Workers::new(threads, Arc::clone(&epoch))?;
        let (tx, rx) = crossbeam_channel::unbounded();
        Ok((
            Self {
                workers,
                cache: Arc::new(FrameCache::new(cache_capacity)),
                epoch,
                tx,
            },
            rx,
        ))
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }
}

impl ImageFetcher for DiskFetcher {
    fn fetch(&self, ticket: LoadTicket) {
        if let Some(frame) = self.cache.get(ticket.locator.as_str()) {
            trace!("Cache hit: {}", ticket.locator);
            // Still delivered through the channel: completions are always async
            let _ = self.tx.send(LoadCompletion {
                ticket,
                result: Ok(frame),
            });
            return;
        }

        let cache = Arc::clone(&self.cache);
        let tx = self.tx.clone();
        let epoch = ticket.epoch;
        self.workers.execute_with_epoch(epoch, move || {
            let result = Loader::load(ticket.locator.path()).map(Arc::new);
            if let Ok(frame) = &result {
                cache.insert(ticket.locator.as_str(), Arc::clone(frame));
            }
            let _ = tx.send(LoadCompletion { ticket, result });
        });
    }

    fn prefetch(&self, epoch: u64, locator: &ImageLocator) {
        if locator.is_empty() || epoch != self.workers.current_epoch() {
            return;
        }
        if !self.cache.try_claim(locator.as_str()) {
            return;
        }
        let cache = Arc::clone(&self.cache);
        let current = Arc::clone(&self.epoch);
        let locator = locator.clone();
        // The claim is dropped on every path, including a skipped job
        self.workers.execute(move || {
            if current.load(Ordering::Relaxed) == epoch {
                match Loader::load(locator.path()) {
                    Ok(frame) => cache.insert(locator.as_str(), Arc::new(frame)),
                    Err(e) => trace!("Preload of {} failed: {}", locator, e),
                }
            } else {
                trace!("Skipping preload from epoch {}: {}", epoch, locator);
            }
            cache.release(locator.as_str());
        });
    }

    fn set_epoch(&self, epoch: u64) {
        debug!("DiskFetcher epoch -> {}", epoch);
        self.epoch.store(epoch, Ordering::SeqCst);
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}
