//! Decoded-image cache with LRU eviction.
//!
//! Key: normalised file path -> `Arc<Frame>`. Shared between the event-loop
//! thread (cache hits answer loads without a decode) and worker threads
//! (inserting finished decodes). The adjacent-frame preload only ever fills
//! this cache; it never touches buffer slots.

use log::trace;
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::entities::Frame;

/// Default number of decoded images kept
pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug)]
pub struct FrameCache {
    cache: Mutex<LruCache<String, Arc<Frame>>>,
    /// Paths with a preload decode currently queued or running
    in_flight: Mutex<HashSet<String>>,
}

impl FrameCache {
    /// Create cache holding up to `capacity` decoded images (0 = default)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<Frame>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get frame, updating LRU order
    pub fn get(&self, path: &str) -> Option<Arc<Frame>> {
        self.lock().get(path).cloned()
    }

    /// Check presence without touching LRU order
    pub fn contains(&self, path: &str) -> bool {
        self.lock().peek(path).is_some()
    }

    pub fn insert(&self, path: &str, frame: Arc<Frame>) {
        let mut cache = self.lock();
        if let Some((evicted, _)) = cache.push(path.to_string(), frame) {
            if evicted != path {
                trace!("FrameCache evicted {}", evicted);
            }
        }
    }

    /// Claim a path for preloading. False if cached or already claimed.
    pub fn try_claim(&self, path: &str) -> bool {
        if self.contains(path) {
            return false;
        }
        self.lock_in_flight().insert(path.to_string())
    }

    /// Release a claim taken with `try_claim()`
    pub fn release(&self, path: &str) {
        self.lock_in_flight().remove(path);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.lock_in_flight().clear();
    }
}
