//! Debounced preloader - delays adjacent-frame preload until scrubbing pauses.
//!
//! While the user drags the timeline we only want the requested frame. Once
//! the slider has been still for a while, frames around it are worth warming:
//! 1. Every scrub release / explicit seek schedules (or re-schedules) a preload
//! 2. `tick()` fires once after the delay if nothing re-scheduled it
//!
//! Time is passed in by the caller so the timeline stays deterministic.

use std::time::{Duration, Instant};

/// Default delay before the preload fires
pub const DEFAULT_DELAY_MS: u64 = 300;

/// Debounced preloader for delayed cache warming after scrubbing.
///
/// # Usage
/// ```ignore
/// // On scrub release:
/// preloader.schedule(frame, now);
///
/// // In the event loop:
/// if let Some(center) = preloader.tick(now) {
///     coordinator.prefetch_around(center, radius);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DebouncedPreloader {
    /// Delay before triggering preload
    delay: Duration,
    /// Pending preload: (center frame, trigger time)
    pending: Option<(i32, Instant)>,
}

impl Default for DebouncedPreloader {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MS)
    }
}

impl DebouncedPreloader {
    /// Create with custom delay
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    pub fn set_delay(&mut self, delay_ms: u64) {
        self.delay = Duration::from_millis(delay_ms);
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }

    /// Schedule a delayed preload around `frame`.
    /// If already pending, resets the timer (debounce behavior).
    pub fn schedule(&mut self, frame: i32, now: Instant) {
        self.pending = Some((frame, now + self.delay));
        log::trace!(
            "DebouncedPreloader: scheduled preload around {} in {}ms",
            frame,
            self.delay.as_millis()
        );
    }

    /// Cancel any pending preload
    pub fn cancel(&mut self) {
        if self.pending.is_some() {
            log::trace!("DebouncedPreloader: cancelled pending preload");
        }
        self.pending = None;
    }

    /// Returns the center frame once the delay has elapsed.
    /// Clears the pending state when triggered.
    pub fn tick(&mut self, now: Instant) -> Option<i32> {
        let (frame, trigger_at) = self.pending?;
        if now >= trigger_at {
            self.pending = None;
            log::trace!("DebouncedPreloader: triggering preload around {}", frame);
            Some(frame)
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Pending center frame (if any)
    pub fn pending_frame(&self) -> Option<i32> {
        self.pending.map(|(frame, _)| frame)
    }

    /// When the pending preload fires
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, at)| at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_no_trigger() {
        let mut preloader = DebouncedPreloader::new(100);
        let now = Instant::now();

        preloader.schedule(12, now);
        assert!(preloader.is_pending());

        // Should not trigger immediately
        assert!(preloader.tick(now).is_none());
    }

    #[test]
    fn test_trigger_after_delay() {
        let mut preloader = DebouncedPreloader::new(10);
        let now = Instant::now();

        preloader.schedule(5, now);
        assert_eq!(preloader.tick(now + Duration::from_millis(15)), Some(5));
        assert!(!preloader.is_pending());
        // fires once
        assert_eq!(preloader.tick(now + Duration::from_millis(30)), None);
    }

    #[test]
    fn test_debounce_resets_timer() {
        let mut preloader = DebouncedPreloader::new(50);
        let t0 = Instant::now();

        preloader.schedule(1, t0);
        let t1 = t0 + Duration::from_millis(30);
        // Re-schedule with different frame - resets timer
        preloader.schedule(2, t1);

        // Would have fired for the first schedule
        assert!(preloader.tick(t0 + Duration::from_millis(60)).is_none());
        assert_eq!(preloader.pending_frame(), Some(2));
        assert_eq!(preloader.tick(t1 + Duration::from_millis(50)), Some(2));
    }

    #[test]
    fn test_wall_clock_smoke() {
        let mut preloader = DebouncedPreloader::new(10);
        preloader.schedule(7, Instant::now());
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(preloader.tick(Instant::now()), Some(7));
    }
}
