//! Frame-index throttle for scrubbing.
//!
//! Bursts of slider updates are coalesced to at most one forwarded value per
//! interval. The latest value always wins: a value pushed inside the window
//! replaces any pending one and is released by `tick()` once the window
//! closes. Nothing older than the pending value is ever forwarded.

use log::trace;
use std::time::{Duration, Instant};

/// Default interval (~60 Hz)
pub const DEFAULT_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<i32>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_MS)
    }
}

impl Throttle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            last_emit: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval = Duration::from_millis(interval_ms);
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_emit
            .map(|t| now.saturating_duration_since(t) >= self.interval)
            .unwrap_or(true)
    }

    /// Offer a value. Returns it if it may be forwarded right away,
    /// otherwise keeps it as the pending value.
    pub fn push(&mut self, value: i32, now: Instant) -> Option<i32> {
        if self.window_open(now) {
            self.last_emit = Some(now);
            self.pending = None;
            Some(value)
        } else {
            if let Some(old) = self.pending.replace(value) {
                trace!("Throttle: {} superseded by {}", old, value);
            }
            None
        }
    }

    /// Release the pending value once the interval has elapsed
    pub fn tick(&mut self, now: Instant) -> Option<i32> {
        if self.pending.is_none() || !self.window_open(now) {
            return None;
        }
        self.last_emit = Some(now);
        self.pending.take()
    }

    /// Release the pending value immediately (scrub end)
    pub fn flush(&mut self, now: Instant) -> Option<i32> {
        let value = self.pending.take()?;
        self.last_emit = Some(now);
        Some(value)
    }

    /// Drop the pending value
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<i32> {
        self.pending
    }

    /// When `tick()` will next release something
    pub fn deadline(&self) -> Option<Instant> {
        self.pending?;
        Some(self.last_emit.map(|t| t + self.interval).unwrap_or_else(Instant::now))
    }
}
