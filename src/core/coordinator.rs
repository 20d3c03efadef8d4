//! Multi-window coordinator.
//!
//! Owns one [`VariantLoader`] per visible window of the current layout and
//! fans each incoming frame index out to them:
//!
//! ```text
//! on_frame_index_changed(f)
//!     clamp f to [start, end]
//!     for each visible window:
//!         guard.request(kind, f)      // exactly once, before any load
//!         loader.request(f)           // back slot only
//! ```
//!
//! Completions come back through [`Coordinator::on_completion`], which drops
//! tickets from older epochs, lets the loader record the result, asks the
//! staleness guard whether it may still flip the window, and finally re-issues
//! the live request if the back slot was busy when it arrived.
//!
//! Windows never look each other up; everything they need (sink, fetcher,
//! base paths, epoch) is handed over when they are built.

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::error_sink::ErrorSink;
use crate::core::fetch::{ImageFetcher, LoadCompletion};
use crate::core::guard::FrameGuard;
use crate::core::loaders::{FrameLoader, LoaderCore, VariantLoader};
use crate::entities::effects::EffectParams;
use crate::entities::{AlphaBase, EventInfo, Frame, VariantKind, VariantPaths};

/// Window arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Layout {
    /// Original, Test and Difference next to each other
    #[default]
    SideBySide,
    /// Alpha window alone
    AlphaOnly,
}

impl Layout {
    /// Variants shown in this layout, left to right
    pub fn windows(self) -> &'static [VariantKind] {
        match self {
            Layout::SideBySide => &[VariantKind::Original, VariantKind::Test, VariantKind::Difference],
            Layout::AlphaOnly => &[VariantKind::Alpha],
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Layout::SideBySide => Layout::AlphaOnly,
            Layout::AlphaOnly => Layout::SideBySide,
        }
    }
}

/// Construction parameters shared by every window of one event
pub struct CoordinatorConfig {
    pub layout: Layout,
    pub alpha_base: AlphaBase,
    pub epoch: u64,
    /// `None` waits forever
    pub load_timeout: Option<Duration>,
}

pub struct Coordinator {
    start: i32,
    end: i32,
    paths: VariantPaths,
    layout: Layout,
    windows: Vec<VariantLoader>,
    guard: FrameGuard,
    epoch: u64,
    /// Last frame index received (clamped)
    current: Option<i32>,
    effects: HashMap<VariantKind, EffectParams>,
    alpha_base: AlphaBase,
    load_timeout: Option<Duration>,
    sink: Arc<dyn ErrorSink>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl Coordinator {
    /// Build windows for `event`. Nothing loads until the first frame index arrives.
    pub fn new(
        event: &EventInfo,
        config: CoordinatorConfig,
        sink: Arc<dyn ErrorSink>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        info!(
            "Opening event '{}' [{}..{}] ({:?}, epoch {})",
            event.name, event.start_frame, event.end_frame, config.layout, config.epoch
        );
        fetcher.set_epoch(config.epoch);
        let mut coordinator = Self {
            start: event.start_frame,
            end: event.end_frame.max(event.start_frame),
            paths: event.paths.clone(),
            layout: config.layout,
            windows: Vec::new(),
            guard: FrameGuard::new(),
            epoch: config.epoch,
            current: None,
            effects: HashMap::new(),
            alpha_base: config.alpha_base,
            load_timeout: config.load_timeout,
            sink,
            fetcher,
        };
        coordinator.windows = coordinator.build_windows();
        coordinator
    }

    fn build_windows(&self) -> Vec<VariantLoader> {
        self.layout
            .windows()
            .iter()
            .map(|&kind| {
                let core = LoaderCore::new(
                    kind,
                    self.paths.clone(),
                    self.epoch,
                    Arc::clone(&self.sink),
                    Arc::clone(&self.fetcher),
                );
                let effects = self.effects.get(&kind).copied().unwrap_or_default();
                VariantLoader::build(core, effects, self.alpha_base)
            })
            .collect()
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn range(&self) -> (i32, i32) {
        (self.start, self.end)
    }

    /// Last frame index received
    pub fn current_frame(&self) -> Option<i32> {
        self.current
    }

    pub fn guard(&self) -> &FrameGuard {
        &self.guard
    }

    pub fn windows(&self) -> &[VariantLoader] {
        &self.windows
    }

    pub fn window(&self, kind: VariantKind) -> Option<&VariantLoader> {
        self.windows.iter().find(|w| w.kind() == kind)
    }

    fn window_mut(&mut self, kind: VariantKind) -> Option<&mut VariantLoader> {
        self.windows.iter_mut().find(|w| w.kind() == kind)
    }

    pub fn alpha_base(&self) -> AlphaBase {
        self.alpha_base
    }

    /// Out-of-range requests are clamped, never reported
    pub fn clamp(&self, frame: i32) -> i32 {
        frame.clamp(self.start, self.end)
    }

    /// Single entry point for frame changes. Returns the clamped frame.
    pub fn on_frame_index_changed(&mut self, frame: i32, now: Instant) -> i32 {
        let frame = self.clamp(frame);
        self.current = Some(frame);
        for window in &mut self.windows {
            let kind = window.kind();
            if !self.guard.request(kind, frame) {
                trace!("{}: frame {} already requested", kind, frame);
                continue;
            }
            window.request(frame, now);
        }
        frame
    }

    /// Apply one finished load
    pub fn on_completion(&mut self, completion: LoadCompletion, now: Instant) {
        let LoadCompletion { ticket, result } = completion;
        if ticket.epoch != self.epoch {
            trace!("Dropping completion from epoch {}: {}", ticket.epoch, ticket.locator);
            return;
        }
        let current = self.guard.is_current(ticket.window, ticket.frame());
        let requested = self.guard.requested(ticket.window);
        let Some(window) = self.window_mut(ticket.window) else {
            trace!("{}: window not shown, dropping {}", ticket.window, ticket.locator);
            return;
        };

        window.complete(&ticket, result, current);
        Self::issue_deferred(window, requested, now);
    }

    /// A request deferred by a busy back slot goes out once the slot is idle
    fn issue_deferred(window: &mut VariantLoader, requested: Option<i32>, now: Instant) -> usize {
        match requested {
            Some(frame) if !window.buffers().back().is_busy() && window.needs_load(frame) => {
                window.request_missing(frame, now)
            }
            _ => 0,
        }
    }

    /// Update one window's effect sliders; re-render happens on next draw
    pub fn set_effect_parameters(&mut self, kind: VariantKind, params: EffectParams) {
        let params = params.clamped();
        self.effects.insert(kind, params);
        if let Some(window) = self.window_mut(kind) {
            if !window.set_effects(params) {
                debug!("{}: window takes no effect parameters", kind);
            }
        }
    }

    pub fn effect_parameters(&self, kind: VariantKind) -> EffectParams {
        self.window(kind)
            .map(|w| w.effects())
            .or_else(|| self.effects.get(&kind).copied())
            .unwrap_or_default()
    }

    /// Alpha A/B switch. Loads the newly selected base for the current frame
    /// only if the front slot does not hold it yet.
    pub fn toggle_alpha_base(&mut self, now: Instant) -> AlphaBase {
        self.alpha_base = self.alpha_base.toggled();
        let requested = self.guard.requested(VariantKind::Alpha);
        if let Some(window) = self.window_mut(VariantKind::Alpha) {
            if let Some(alpha) = window.as_alpha_mut() {
                alpha.toggle_base();
            }
            if let Some(frame) = requested {
                window.request_missing(frame, now);
            }
        }
        self.alpha_base
    }

    /// Warm the cache for `center ± radius`, visible windows only
    pub fn prefetch_around(&self, center: i32, radius: i32) -> usize {
        let center = self.clamp(center);
        let mut count = 0;
        for offset in 1..=radius.max(0) {
            for frame in [center + offset, center - offset] {
                if frame < self.start || frame > self.end {
                    continue;
                }
                for window in &self.windows {
                    for locator in window.prefetch_locators(frame) {
                        self.fetcher.prefetch(self.epoch, &locator);
                        count += 1;
                    }
                }
            }
        }
        trace!("Prefetch around {}: {} images", center, count);
        count
    }

    /// Fail loads stuck past the configured timeout. A request that waited
    /// behind an expired load is issued right away.
    pub fn check_timeouts(&mut self, now: Instant) -> usize {
        let Some(timeout) = self.load_timeout else {
            return 0;
        };
        let mut expired = 0;
        for window in &mut self.windows {
            let requested = self.guard.requested(window.kind());
            let count = window.expire(now, timeout, requested);
            if count > 0 {
                expired += count;
                Self::issue_deferred(window, requested, now);
            }
        }
        expired
    }

    /// Switch layout: windows of the old layout are dropped, the new ones
    /// start empty and load the current frame.
    pub fn set_layout(&mut self, layout: Layout, now: Instant) {
        if layout == self.layout {
            return;
        }
        info!("Layout {:?} -> {:?}", self.layout, layout);
        self.layout = layout;
        // Completions for the dropped windows must not land in the new ones
        self.epoch += 1;
        self.fetcher.set_epoch(self.epoch);
        self.guard.clear();
        self.windows = self.build_windows();
        if let Some(frame) = self.current {
            self.on_frame_index_changed(frame, now);
        }
    }

    /// Picture for `kind`'s window, effects applied
    pub fn render(&mut self, kind: VariantKind) -> Option<Arc<Frame>> {
        self.window_mut(kind)?.render()
    }

    /// Frame shown by `kind`'s window
    pub fn displayed_frame(&self, kind: VariantKind) -> Option<i32> {
        self.window(kind)?.displayed_frame()
    }
}
