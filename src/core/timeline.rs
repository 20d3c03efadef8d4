//! Timeline controller: the only producer of frame-index changes.
//!
//! Owns the scrub position, forward/reverse playback and the throttle and
//! preload timers. Input methods never call into the loaders directly; they
//! queue [`TimelineSignal`]s that the session drains with `poll()`.
//!
//! # States
//!
//! ```text
//!            begin_scrub / seek              end_scrub
//!   Idle ─────────────────────────▶ Scrubbing ─────────▶ Idle (+ preload timer)
//!    │  ▲                              ▲
//!    │  │ stop / boundary              │ drag (cancels playback)
//!    ▼  │                              │
//!   PlayingForward / PlayingReverse ───┘
//! ```
//!
//! Playback clamps at the sequence ends and never wraps. Time is always
//! passed in, so every transition is reproducible in tests.

use log::{debug, trace};
use std::time::{Duration, Instant};

use crate::core::debounced_preloader::DebouncedPreloader;
use crate::core::throttle::Throttle;

/// Playback speed multipliers
pub const SPEED_PRESETS: [f32; 5] = [0.25, 0.5, 1.0, 2.0, 4.0];

/// Index of 1x in `SPEED_PRESETS`
pub const DEFAULT_SPEED_INDEX: usize = 2;

/// Base playback rate at 1x
pub const DEFAULT_FPS: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Scrubbing,
    PlayingForward,
    PlayingReverse,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::PlayingForward | PlaybackState::PlayingReverse)
    }

    fn direction(self) -> i32 {
        match self {
            PlaybackState::PlayingReverse => -1,
            _ => 1,
        }
    }
}

/// Output of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineSignal {
    /// Forward this frame to the coordinator
    FrameChanged(i32),
    /// Warm the cache around this frame
    Preload(i32),
}

/// Timer settings
#[derive(Debug, Clone, Copy)]
pub struct TimelineConfig {
    pub throttle_ms: u64,
    pub preload_delay_ms: u64,
    pub base_fps: f32,
    pub speed_index: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            throttle_ms: crate::core::throttle::DEFAULT_INTERVAL_MS,
            preload_delay_ms: crate::core::debounced_preloader::DEFAULT_DELAY_MS,
            base_fps: DEFAULT_FPS,
            speed_index: DEFAULT_SPEED_INDEX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimelineController {
    start: i32,
    end: i32,
    /// Last forwarded frame
    position: i32,
    /// Slider value (may run ahead of `position` while throttled)
    slider: i32,
    state: PlaybackState,
    throttle: Throttle,
    preloader: DebouncedPreloader,
    base_fps: f32,
    speed_index: usize,
    next_step: Option<Instant>,
    signals: Vec<TimelineSignal>,
}

impl TimelineController {
    pub fn new(start: i32, end: i32, config: TimelineConfig) -> Self {
        let end = end.max(start);
        Self {
            start,
            end,
            position: start,
            slider: start,
            state: PlaybackState::Idle,
            throttle: Throttle::new(config.throttle_ms),
            preloader: DebouncedPreloader::new(config.preload_delay_ms),
            base_fps: if config.base_fps > 0.0 { config.base_fps } else { DEFAULT_FPS },
            speed_index: config.speed_index.min(SPEED_PRESETS.len() - 1),
            next_step: None,
            signals: Vec::new(),
        }
    }

    /// New event: new range, position at `start`, timers cleared
    pub fn reset(&mut self, start: i32, end: i32) {
        self.start = start;
        self.end = end.max(start);
        self.position = start;
        self.slider = start;
        self.state = PlaybackState::Idle;
        self.throttle.cancel();
        self.preloader.cancel();
        self.next_step = None;
        self.signals.clear();
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn range(&self) -> (i32, i32) {
        (self.start, self.end)
    }

    /// Last forwarded frame
    pub fn position(&self) -> i32 {
        self.position
    }

    /// Slider value as displayed
    pub fn slider(&self) -> i32 {
        self.slider
    }

    pub fn clamp(&self, frame: i32) -> i32 {
        frame.clamp(self.start, self.end)
    }

    fn forward(&mut self, frame: i32) {
        self.slider = frame;
        if frame != self.position {
            self.position = frame;
            self.signals.push(TimelineSignal::FrameChanged(frame));
        }
    }

    fn settle(&mut self, now: Instant) {
        self.state = PlaybackState::Idle;
        self.next_step = None;
        self.preloader.schedule(self.position, now);
    }

    // --- Scrubbing ---

    /// Drag start: cancels playback and any pending preload
    pub fn begin_scrub(&mut self, _now: Instant) {
        if self.state.is_playing() {
            debug!("Timeline: drag cancels playback");
        }
        self.state = PlaybackState::Scrubbing;
        self.next_step = None;
        self.preloader.cancel();
    }

    /// Slider moved. Forwarded at most once per throttle interval.
    pub fn scrub_to(&mut self, frame: i32, now: Instant) {
        if self.state != PlaybackState::Scrubbing {
            self.begin_scrub(now);
        }
        let frame = self.clamp(frame);
        self.slider = frame;
        if let Some(value) = self.throttle.push(frame, now) {
            self.forward(value);
        }
    }

    /// Drag released: forward the final value, schedule preload
    pub fn end_scrub(&mut self, now: Instant) {
        if let Some(value) = self.throttle.flush(now) {
            self.forward(value);
        }
        if self.state == PlaybackState::Scrubbing {
            self.settle(now);
        }
    }

    // --- Explicit frame entry ---

    /// Jump to `frame` (typed entry, chart click, step buttons)
    pub fn seek(&mut self, frame: i32, now: Instant) {
        self.begin_scrub(now);
        self.throttle.cancel();
        let frame = self.clamp(frame);
        self.forward(frame);
        self.settle(now);
    }

    /// Move by `delta` frames from the current position
    pub fn step(&mut self, delta: i32, now: Instant) {
        self.seek(self.position.saturating_add(delta), now);
    }

    pub fn to_start(&mut self, now: Instant) {
        self.seek(self.start, now);
    }

    pub fn to_end(&mut self, now: Instant) {
        self.seek(self.end, now);
    }

    // --- Playback ---

    fn frame_interval(&self) -> Duration {
        let fps = self.base_fps * SPEED_PRESETS[self.speed_index];
        Duration::from_secs_f32(1.0 / fps)
    }

    fn start_playback(&mut self, state: PlaybackState, now: Instant) {
        self.throttle.cancel();
        self.preloader.cancel();
        self.state = state;
        self.next_step = Some(now + self.frame_interval());
        debug!("Timeline: {:?} at {} fps", state, self.fps());
    }

    pub fn play_forward(&mut self, now: Instant) {
        self.start_playback(PlaybackState::PlayingForward, now);
    }

    pub fn play_reverse(&mut self, now: Instant) {
        self.start_playback(PlaybackState::PlayingReverse, now);
    }

    /// Play forward, or stop if already playing
    pub fn toggle_play(&mut self, now: Instant) {
        if self.state.is_playing() {
            self.stop(now);
        } else {
            self.play_forward(now);
        }
    }

    pub fn stop(&mut self, now: Instant) {
        if self.state.is_playing() {
            debug!("Timeline: stop at {}", self.position);
            self.settle(now);
        }
    }

    pub fn speed_index(&self) -> usize {
        self.speed_index
    }

    pub fn speed(&self) -> f32 {
        SPEED_PRESETS[self.speed_index]
    }

    /// Effective playback rate
    pub fn fps(&self) -> f32 {
        self.base_fps * self.speed()
    }

    /// Select a speed preset; playback direction is kept
    pub fn set_speed_index(&mut self, index: usize, now: Instant) {
        self.speed_index = index.min(SPEED_PRESETS.len() - 1);
        if self.state.is_playing() {
            self.next_step = Some(now + self.frame_interval());
        }
    }

    pub fn faster(&mut self, now: Instant) {
        self.set_speed_index(self.speed_index + 1, now);
    }

    pub fn slower(&mut self, now: Instant) {
        self.set_speed_index(self.speed_index.saturating_sub(1), now);
    }

    // --- Timers ---

    /// Change throttle interval and preload delay. An already scheduled
    /// preload keeps its deadline.
    pub fn set_timing(&mut self, throttle_ms: u64, preload_delay_ms: u64) {
        self.throttle.set_interval(throttle_ms);
        self.preloader.set_delay(preload_delay_ms);
    }

    /// Advance timers. Call from the event loop.
    pub fn tick(&mut self, now: Instant) {
        if let Some(value) = self.throttle.tick(now) {
            self.forward(value);
        }

        if let Some(center) = self.preloader.tick(now) {
            self.signals.push(TimelineSignal::Preload(center));
        }

        if let Some(due) = self.next_step {
            if now >= due && self.state.is_playing() {
                self.advance(now);
            }
        }
    }

    fn advance(&mut self, now: Instant) {
        let next = self.position + self.state.direction();
        let clamped = self.clamp(next);
        if clamped != next || clamped == self.position {
            trace!("Timeline: boundary at {}", self.position);
            self.settle(now);
            return;
        }
        self.forward(clamped);
        if clamped == self.start || clamped == self.end {
            self.settle(now);
        } else {
            self.next_step = Some(now + self.frame_interval());
        }
    }

    /// Earliest instant at which `tick()` has something to do
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.throttle.deadline(), self.preloader.deadline(), self.next_step]
            .into_iter()
            .flatten()
            .min()
    }

    /// Drain queued signals
    pub fn poll(&mut self) -> Vec<TimelineSignal> {
        std::mem::take(&mut self.signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TimelineSignal::{FrameChanged, Preload};

    fn timeline(start: i32, end: i32) -> TimelineController {
        TimelineController::new(start, end, TimelineConfig::default())
    }

    fn frames(signals: &[TimelineSignal]) -> Vec<i32> {
        signals
            .iter()
            .filter_map(|s| match s {
                FrameChanged(f) => Some(*f),
                Preload(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_scrub_burst_throttled() {
        let mut tl = timeline(0, 100);
        let t0 = Instant::now();
        tl.begin_scrub(t0);
        for i in 0..50u64 {
            let now = t0 + Duration::from_micros(i * 100);
            tl.scrub_to(i as i32 + 1, now);
            tl.tick(now);
        }
        assert_eq!(frames(&tl.poll()), vec![1]);

        tl.tick(t0 + Duration::from_millis(16));
        assert_eq!(frames(&tl.poll()), vec![50]);
        assert_eq!(tl.position(), 50);
    }

    #[test]
    fn test_release_flushes_and_preloads() {
        let mut tl = timeline(0, 100);
        let t0 = Instant::now();
        tl.scrub_to(10, t0);
        tl.scrub_to(20, t0 + Duration::from_millis(1));
        tl.end_scrub(t0 + Duration::from_millis(2));
        assert_eq!(tl.state(), PlaybackState::Idle);
        assert_eq!(frames(&tl.poll()), vec![10, 20]);

        tl.tick(t0 + Duration::from_millis(100));
        assert!(tl.poll().is_empty());
        tl.tick(t0 + Duration::from_millis(302));
        assert_eq!(tl.poll(), vec![Preload(20)]);
    }

    #[test]
    fn test_timing_change_applies() {
        let mut tl = timeline(0, 100);
        tl.set_timing(50, 100);
        let t0 = Instant::now();
        tl.begin_scrub(t0);
        tl.scrub_to(1, t0);
        tl.scrub_to(2, t0 + Duration::from_millis(20));
        tl.tick(t0 + Duration::from_millis(20));
        assert_eq!(frames(&tl.poll()), vec![1]);
        tl.tick(t0 + Duration::from_millis(50));
        assert_eq!(frames(&tl.poll()), vec![2]);

        tl.end_scrub(t0 + Duration::from_millis(60));
        tl.poll();
        tl.tick(t0 + Duration::from_millis(161));
        assert_eq!(tl.poll(), vec![Preload(2)]);
    }

    #[test]
    fn test_scrubbing_again_cancels_preload() {
        let mut tl = timeline(0, 100);
        let t0 = Instant::now();
        tl.seek(5, t0);
        tl.poll();
        tl.begin_scrub(t0 + Duration::from_millis(100));
        tl.tick(t0 + Duration::from_millis(400));
        assert!(tl.poll().is_empty());
    }

    #[test]
    fn test_seek_clamps() {
        let mut tl = timeline(10, 20);
        let now = Instant::now();
        tl.seek(5, now);
        assert_eq!(tl.position(), 10);
        tl.seek(25, now);
        assert_eq!(tl.position(), 20);
        tl.seek(10, now);
        assert_eq!(tl.position(), 10);
        tl.seek(20, now);
        assert_eq!(tl.position(), 20);
        assert_eq!(frames(&tl.poll()), vec![20, 10, 20]);
    }

    #[test]
    fn test_playback_forward_stops_at_end() {
        let mut tl = timeline(0, 3);
        let mut now = Instant::now();
        tl.play_forward(now);
        assert_eq!(tl.state(), PlaybackState::PlayingForward);
        for _ in 0..10 {
            now += Duration::from_millis(50);
            tl.tick(now);
        }
        assert_eq!(frames(&tl.poll()), vec![1, 2, 3]);
        assert_eq!(tl.state(), PlaybackState::Idle);
        assert_eq!(tl.position(), 3);
    }

    #[test]
    fn test_playback_reverse_never_wraps() {
        let mut tl = timeline(0, 10);
        let mut now = Instant::now();
        tl.seek(2, now);
        tl.poll();
        tl.play_reverse(now);
        for _ in 0..10 {
            now += Duration::from_millis(50);
            tl.tick(now);
        }
        assert_eq!(frames(&tl.poll()), vec![1, 0]);
        assert_eq!(tl.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_playback_at_boundary_goes_idle() {
        let mut tl = timeline(0, 10);
        let now = Instant::now();
        tl.to_end(now);
        tl.poll();
        tl.play_forward(now);
        tl.tick(now + Duration::from_millis(100));
        assert_eq!(tl.state(), PlaybackState::Idle);
        assert!(frames(&tl.poll()).is_empty());
    }

    #[test]
    fn test_playback_rate() {
        let mut tl = timeline(0, 1000);
        let t0 = Instant::now();
        tl.play_forward(t0);
        // 24 fps at 1x: nothing before ~41.7 ms
        tl.tick(t0 + Duration::from_millis(40));
        assert!(tl.poll().is_empty());
        tl.tick(t0 + Duration::from_millis(42));
        assert_eq!(tl.poll(), vec![FrameChanged(1)]);
    }

    #[test]
    fn test_drag_cancels_playback() {
        let mut tl = timeline(0, 100);
        let now = Instant::now();
        tl.play_forward(now);
        tl.scrub_to(50, now);
        assert_eq!(tl.state(), PlaybackState::Scrubbing);
        tl.tick(now + Duration::from_secs(1));
        assert_eq!(tl.position(), 50);
    }

    #[test]
    fn test_speed_presets_keep_direction() {
        let mut tl = timeline(0, 100);
        let now = Instant::now();
        assert_eq!(tl.speed(), 1.0);
        tl.play_reverse(now);
        tl.faster(now);
        tl.faster(now);
        tl.faster(now);
        assert_eq!(tl.speed(), 4.0);
        assert_eq!(tl.state(), PlaybackState::PlayingReverse);
        for _ in 0..10 {
            tl.slower(now);
        }
        assert_eq!(tl.speed(), 0.25);
        assert_eq!(tl.fps(), 6.0);
    }

    #[test]
    fn test_step_and_jumps() {
        let mut tl = timeline(1, 9);
        let now = Instant::now();
        tl.step(1, now);
        tl.step(1, now);
        tl.step(-1, now);
        tl.to_end(now);
        tl.to_start(now);
        assert_eq!(frames(&tl.poll()), vec![2, 3, 2, 9, 1]);
    }

    #[test]
    fn test_next_deadline() {
        let mut tl = timeline(0, 100);
        let t0 = Instant::now();
        assert_eq!(tl.next_deadline(), None);
        tl.seek(4, t0);
        assert_eq!(tl.next_deadline(), Some(t0 + Duration::from_millis(300)));
        tl.play_forward(t0);
        assert!(tl.next_deadline().unwrap() < t0 + Duration::from_millis(50));
    }
}
