//! Session: one viewer window's engine.
//!
//! Owns the open event, the timeline controller, the coordinator with its
//! windows, the score chart and the completion channel. Everything runs on
//! the caller's thread:
//!
//! - input methods (`scrub_to`, `seek`, `play_forward`, ...) update the
//!   timeline and immediately dispatch its signals, so the chart marker and
//!   the coordinator see a new frame in the same call
//! - `pump(now)` advances timers, applies finished loads and expires stuck
//!   ones; the UI calls it once per repaint
//!
//! Lifecycle: `open_event()` starts a new epoch and builds fresh buffers,
//! `close_event()` drops them. Completions from a previous epoch are ignored.

use crossbeam_channel::Receiver;
use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::coordinator::{Coordinator, CoordinatorConfig, Layout};
use crate::core::error_sink::ErrorSink;
use crate::core::fetch::{DiskFetcher, ImageFetcher, LoadCompletion};
use crate::core::loaders::FrameLoader;
use crate::core::timeline::{PlaybackState, TimelineConfig, TimelineController, TimelineSignal};
use crate::entities::effects::EffectParams;
use crate::entities::{AlphaBase, EventInfo, Frame, ScoreChart, VariantKind};

/// Engine settings (see `config::Settings` for the persisted form)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub timeline: TimelineConfig,
    pub preload_radius: i32,
    pub load_timeout: Option<Duration>,
    pub alpha_base: AlphaBase,
    pub layout: Layout,
    pub score_threshold: Option<f64>,
    pub score_higher_is_worse: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeline: TimelineConfig::default(),
            preload_radius: 2,
            load_timeout: Some(Duration::from_secs(10)),
            alpha_base: AlphaBase::Test,
            layout: Layout::SideBySide,
            score_threshold: None,
            score_higher_is_worse: true,
        }
    }
}

/// What one `pump()` did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub frames: usize,
    pub completions: usize,
    pub expired: usize,
}

impl PumpStats {
    /// Anything on screen may have changed
    pub fn changed(&self) -> bool {
        self.frames > 0 || self.completions > 0 || self.expired > 0
    }
}

pub struct Session {
    config: SessionConfig,
    event: Option<EventInfo>,
    timeline: TimelineController,
    coordinator: Option<Coordinator>,
    chart: Option<ScoreChart>,
    layout: Layout,
    alpha_base: AlphaBase,
    epoch: u64,
    fetcher: Arc<dyn ImageFetcher>,
    completions: Receiver<LoadCompletion>,
    sink: Arc<dyn ErrorSink>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        fetcher: Arc<dyn ImageFetcher>,
        completions: Receiver<LoadCompletion>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            timeline: TimelineController::new(0, 0, config.timeline),
            layout: config.layout,
            alpha_base: config.alpha_base,
            config,
            event: None,
            coordinator: None,
            chart: None,
            epoch: 0,
            fetcher,
            completions,
            sink,
        }
    }

    /// Session reading images from disk with `threads` decoders
    pub fn with_disk(
        config: SessionConfig,
        threads: usize,
        cache_capacity: usize,
        sink: Arc<dyn ErrorSink>,
    ) -> std::io::Result<Self> {
        let (fetcher, completions) = DiskFetcher::new(threads, cache_capacity)?;
        Ok(Self::new(config, Arc::new(fetcher), completions, sink))
    }

    // --- Event lifecycle ---

    /// Open `event`: new epoch, fresh buffers, timeline at the first frame
    pub fn open_event(&mut self, event: EventInfo, now: Instant) {
        self.epoch += 1;
        self.fetcher.clear_cache();
        info!(
            "Session: event '{}' ({} frames)",
            event.name,
            event.frame_count()
        );

        let coordinator = Coordinator::new(
            &event,
            CoordinatorConfig {
                layout: self.layout,
                alpha_base: self.alpha_base,
                epoch: self.epoch,
                load_timeout: self.config.load_timeout,
            },
            Arc::clone(&self.sink),
            Arc::clone(&self.fetcher),
        );
        let mut chart = ScoreChart::new(
            &event,
            self.config.score_threshold,
            self.config.score_higher_is_worse,
        );
        chart.set_marker(event.start_frame);

        self.timeline.reset(event.start_frame, event.end_frame);
        self.coordinator = Some(coordinator);
        self.chart = Some(chart);
        let start = event.start_frame;
        self.event = Some(event);

        // First frame goes out directly: the timeline starts there already
        if let Some(coordinator) = &mut self.coordinator {
            coordinator.on_frame_index_changed(start, now);
        }
    }

    /// Drop buffers and chart; late completions are discarded
    pub fn close_event(&mut self) {
        if let Some(event) = self.event.take() {
            info!("Session: closing '{}'", event.name);
        }
        self.epoch += 1;
        self.fetcher.set_epoch(self.epoch);
        self.fetcher.clear_cache();
        self.coordinator = None;
        self.chart = None;
        self.timeline.reset(0, 0);
    }

    pub fn event(&self) -> Option<&EventInfo> {
        self.event.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.event.is_some()
    }

    pub fn timeline(&self) -> &TimelineController {
        &self.timeline
    }

    pub fn chart(&self) -> Option<&ScoreChart> {
        self.chart.as_ref()
    }

    pub fn coordinator(&self) -> Option<&Coordinator> {
        self.coordinator.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // --- Event loop ---

    fn dispatch(&mut self, now: Instant) -> usize {
        let mut frames = 0;
        for signal in self.timeline.poll() {
            match signal {
                TimelineSignal::FrameChanged(frame) => {
                    frames += 1;
                    if let Some(chart) = &mut self.chart {
                        chart.set_marker(frame);
                    }
                    if let Some(coordinator) = &mut self.coordinator {
                        coordinator.on_frame_index_changed(frame, now);
                    }
                }
                TimelineSignal::Preload(center) => {
                    if let Some(coordinator) = &self.coordinator {
                        coordinator.prefetch_around(center, self.config.preload_radius);
                    }
                }
            }
        }
        frames
    }

    /// Advance timers, apply finished loads, fail stuck ones
    pub fn pump(&mut self, now: Instant) -> PumpStats {
        self.timeline.tick(now);
        let frames = self.dispatch(now);

        let mut completions = 0;
        while let Ok(completion) = self.completions.try_recv() {
            completions += 1;
            match &mut self.coordinator {
                Some(coordinator) => coordinator.on_completion(completion, now),
                None => debug!("No event open, dropping {}", completion.ticket.locator),
            }
        }

        let expired = self
            .coordinator
            .as_mut()
            .map(|c| c.check_timeouts(now))
            .unwrap_or(0);

        PumpStats {
            frames,
            completions,
            expired,
        }
    }

    /// When `pump()` next has timer work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timeline.next_deadline()
    }

    /// Whether loads are still in flight in any window
    pub fn is_loading(&self) -> bool {
        self.coordinator
            .as_ref()
            .map(|c| c.windows().iter().any(|w| w.buffers().back().is_busy()))
            .unwrap_or(false)
    }

    // --- Timeline input ---

    pub fn begin_scrub(&mut self, now: Instant) {
        self.timeline.begin_scrub(now);
    }

    pub fn scrub_to(&mut self, frame: i32, now: Instant) {
        self.timeline.scrub_to(frame, now);
        self.dispatch(now);
    }

    pub fn end_scrub(&mut self, now: Instant) {
        self.timeline.end_scrub(now);
        self.dispatch(now);
    }

    /// Explicit frame entry
    pub fn seek(&mut self, frame: i32, now: Instant) {
        self.timeline.seek(frame, now);
        self.dispatch(now);
    }

    pub fn step(&mut self, delta: i32, now: Instant) {
        self.timeline.step(delta, now);
        self.dispatch(now);
    }

    pub fn to_start(&mut self, now: Instant) {
        self.timeline.to_start(now);
        self.dispatch(now);
    }

    pub fn to_end(&mut self, now: Instant) {
        self.timeline.to_end(now);
        self.dispatch(now);
    }

    pub fn play_forward(&mut self, now: Instant) {
        self.timeline.play_forward(now);
    }

    pub fn play_reverse(&mut self, now: Instant) {
        self.timeline.play_reverse(now);
    }

    pub fn toggle_play(&mut self, now: Instant) {
        self.timeline.toggle_play(now);
    }

    pub fn stop(&mut self, now: Instant) {
        self.timeline.stop(now);
    }

    pub fn faster(&mut self, now: Instant) {
        self.timeline.faster(now);
    }

    pub fn slower(&mut self, now: Instant) {
        self.timeline.slower(now);
    }

    pub fn set_speed_index(&mut self, index: usize, now: Instant) {
        self.timeline.set_speed_index(index, now);
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.timeline.state()
    }

    /// Current frame (last forwarded)
    pub fn frame(&self) -> i32 {
        self.timeline.position()
    }

    // --- Chart navigation ---

    /// Chart click at `fraction` of the visible `view` range
    pub fn seek_fraction(&mut self, fraction: f32, view: (i32, i32), now: Instant) {
        self.seek(ScoreChart::frame_at(fraction, view), now);
    }

    /// Jump to the next problem frame after the current one
    pub fn next_problem(&mut self, now: Instant) -> Option<i32> {
        let target = self.chart.as_ref()?.next_problem_after(self.frame())?;
        self.seek(target, now);
        Some(target)
    }

    /// Jump to the previous problem frame before the current one
    pub fn prev_problem(&mut self, now: Instant) -> Option<i32> {
        let target = self.chart.as_ref()?.prev_problem_before(self.frame())?;
        self.seek(target, now);
        Some(target)
    }

    /// Throttle interval and preload delay, applied immediately
    pub fn set_timing(&mut self, throttle_ms: u64, preload_delay_ms: u64) {
        self.config.timeline.throttle_ms = throttle_ms;
        self.config.timeline.preload_delay_ms = preload_delay_ms;
        self.timeline.set_timing(throttle_ms, preload_delay_ms);
    }

    pub fn set_score_threshold(&mut self, threshold: Option<f64>) {
        self.config.score_threshold = threshold;
        if let Some(chart) = &mut self.chart {
            chart.set_threshold(threshold);
        }
    }

    // --- Windows ---

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn set_layout(&mut self, layout: Layout, now: Instant) {
        self.layout = layout;
        if let Some(coordinator) = &mut self.coordinator {
            coordinator.set_layout(layout, now);
            self.epoch = coordinator.epoch();
        }
    }

    pub fn set_effect_parameters(&mut self, kind: VariantKind, params: EffectParams) {
        if let Some(coordinator) = &mut self.coordinator {
            coordinator.set_effect_parameters(kind, params);
        }
    }

    pub fn effect_parameters(&self, kind: VariantKind) -> EffectParams {
        self.coordinator
            .as_ref()
            .map(|c| c.effect_parameters(kind))
            .unwrap_or_default()
    }

    pub fn alpha_base(&self) -> AlphaBase {
        self.alpha_base
    }

    /// Alpha window A/B switch
    pub fn toggle_alpha_base(&mut self, now: Instant) -> AlphaBase {
        self.alpha_base = match &mut self.coordinator {
            Some(coordinator) => coordinator.toggle_alpha_base(now),
            None => self.alpha_base.toggled(),
        };
        self.alpha_base
    }

    /// Picture for `kind`'s window
    pub fn render(&mut self, kind: VariantKind) -> Option<Arc<Frame>> {
        self.coordinator.as_mut()?.render(kind)
    }

    /// Frame shown by `kind`'s window
    pub fn displayed_frame(&self, kind: VariantKind) -> Option<i32> {
        self.coordinator.as_ref()?.displayed_frame(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error_sink::testing::CollectingSink;
    use crate::core::fetch::testing::RecordingFetcher;
    use crate::core::fetch::LoadTicket;
    use crate::entities::{ScorePoint, VariantPaths};
    use crossbeam_channel::Sender;

    struct Fixture {
        session: Session,
        fetcher: Arc<RecordingFetcher>,
        tx: Sender<LoadCompletion>,
    }

    fn event(start: i32, end: i32) -> EventInfo {
        let mut event = EventInfo::new(
            "cam01",
            start,
            end,
            VariantPaths {
                original: "/r/orig/".into(),
                test: "/r/test/".into(),
                difference: "/r/diff/".into(),
                alpha: "/r/alpha/".into(),
            },
        );
        event.scores = (start..=end)
            .map(|frame| ScorePoint {
                frame,
                value: if frame % 5 == 0 { 0.9 } else { 0.1 },
            })
            .collect();
        event
    }

    fn fixture(layout: Layout) -> Fixture {
        let fetcher = Arc::new(RecordingFetcher::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = SessionConfig {
            layout,
            score_threshold: Some(0.5),
            ..Default::default()
        };
        let session = Session::new(config, fetcher.clone(), rx, Arc::new(CollectingSink::default()));
        Fixture { session, fetcher, tx }
    }

    impl Fixture {
        fn complete_all(&self, tickets: Vec<LoadTicket>) {
            for t in tickets {
                self.tx
                    .send(crate::core::fetch::testing::ok(t))
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_open_loads_first_frame() {
        let mut fx = fixture(Layout::AlphaOnly);
        let now = Instant::now();
        fx.session.open_event(event(100, 120), now);
        let tickets = fx.fetcher.take_fetched();
        assert_eq!(tickets.len(), 2);
        assert!(tickets.iter().all(|t| t.frame() == 100 && t.epoch == 1));
        assert_eq!(fx.session.chart().unwrap().marker(), Some(100));

        fx.complete_all(tickets);
        let stats = fx.session.pump(now);
        assert_eq!(stats.completions, 2);
        assert_eq!(fx.session.displayed_frame(VariantKind::Alpha), Some(100));
        assert!(fx.session.render(VariantKind::Alpha).is_some());
    }

    #[test]
    fn test_marker_follows_frame_synchronously() {
        let mut fx = fixture(Layout::SideBySide);
        let now = Instant::now();
        fx.session.open_event(event(1, 50), now);
        fx.session.seek(17, now);
        // no completion yet, marker already moved
        assert_eq!(fx.session.chart().unwrap().marker(), Some(17));
        assert_eq!(fx.session.displayed_frame(VariantKind::Test), None);
    }

    #[test]
    fn test_problem_navigation() {
        let mut fx = fixture(Layout::SideBySide);
        let now = Instant::now();
        fx.session.open_event(event(1, 30), now);
        assert_eq!(fx.session.next_problem(now), Some(5));
        assert_eq!(fx.session.next_problem(now), Some(10));
        assert_eq!(fx.session.prev_problem(now), Some(5));
        assert_eq!(fx.session.prev_problem(now), None);
        assert_eq!(fx.session.frame(), 5);
    }

    #[test]
    fn test_scrub_then_preload() {
        let mut fx = fixture(Layout::SideBySide);
        let t0 = Instant::now();
        fx.session.open_event(event(1, 50), t0);
        fx.fetcher.take_fetched();

        fx.session.begin_scrub(t0);
        fx.session.scrub_to(10, t0);
        fx.session.end_scrub(t0 + Duration::from_millis(1));
        assert!(fx.fetcher.take_prefetched().is_empty());

        fx.session.pump(t0 + Duration::from_millis(400));
        // 3 windows x frames 8, 9, 11, 12
        assert_eq!(fx.fetcher.take_prefetched().len(), 12);
    }

    #[test]
    fn test_playback_pumps_frames() {
        let mut fx = fixture(Layout::SideBySide);
        let mut now = Instant::now();
        fx.session.open_event(event(1, 3), now);
        fx.session.play_forward(now);
        for _ in 0..5 {
            now += Duration::from_millis(50);
            let tickets = fx.fetcher.take_fetched();
            fx.complete_all(tickets);
            fx.session.pump(now);
        }
        assert_eq!(fx.session.frame(), 3);
        assert_eq!(fx.session.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn test_reopen_discards_old_completions() {
        let mut fx = fixture(Layout::SideBySide);
        let now = Instant::now();
        fx.session.open_event(event(1, 10), now);
        let old = fx.fetcher.take_fetched();
        fx.session.open_event(event(1, 10), now);
        fx.complete_all(old);
        fx.session.pump(now);
        assert_eq!(fx.session.displayed_frame(VariantKind::Original), None);
        assert_eq!(*fx.fetcher.cache_clears.lock().unwrap(), 2);
    }

    #[test]
    fn test_toggle_without_event() {
        let mut fx = fixture(Layout::AlphaOnly);
        assert_eq!(fx.session.toggle_alpha_base(Instant::now()), AlphaBase::Original);
    }
}
