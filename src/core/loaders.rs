//! Variant loaders: one per displayed comparison window.
//!
//! Every loader wraps a [`BufferPair`] and differs only in which images a
//! frame needs and how the front slot is turned into the picture on screen:
//!
//! - [`PlainLoader`]: Original / Test, one image, shown as-is
//! - [`DifferenceLoader`]: one image through the hue/saturation/lightness filter
//! - [`AlphaLoader`]: selected base (Original or Test) under the Alpha mask,
//!   with an A/B toggle. Only the selected base is loaded.
//!
//! Shared request / completion / timeout flow lives in the provided methods
//! of [`FrameLoader`]; [`VariantLoader`] dispatches over the three kinds.

use enum_dispatch::enum_dispatch;
use log::{debug, trace};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::buffer::{BufferPair, ResourceRole};
use crate::core::error_sink::{ErrorKind, ErrorSink, LoadReport};
use crate::core::fetch::{ImageFetcher, LoadTicket};
use crate::core::resolver::{ImageLocator, resolve};
use crate::entities::effects::{EffectParams, composite, hsl};
use crate::entities::{AlphaBase, Frame, FrameError, VariantKind, VariantPaths};

/// State every loader owns: its buffers and the injected collaborators
pub struct LoaderCore {
    kind: VariantKind,
    pair: BufferPair,
    paths: VariantPaths,
    epoch: u64,
    sink: Arc<dyn ErrorSink>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl LoaderCore {
    pub fn new(
        kind: VariantKind,
        paths: VariantPaths,
        epoch: u64,
        sink: Arc<dyn ErrorSink>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            kind,
            pair: BufferPair::new(kind),
            paths,
            epoch,
            sink,
            fetcher,
        }
    }

    fn locator(&self, frame: i32, kind: VariantKind) -> ImageLocator {
        resolve(self.paths.get(kind), frame, kind)
    }

    fn report(&self, kind: ErrorKind, frame: i32, locator: &ImageLocator, message: String) {
        self.sink.report(LoadReport {
            kind,
            window: self.kind,
            frame,
            path: locator.to_string(),
            message,
        });
    }
}

/// Common interface of the per-window loaders
#[enum_dispatch]
pub trait FrameLoader {
    fn core(&self) -> &LoaderCore;

    fn core_mut(&mut self) -> &mut LoaderCore;

    /// Images the currently displayed content needs
    fn required_roles(&self) -> Vec<ResourceRole>;

    /// Images to load for `frame`, given the current toggle state
    fn locators(&self, frame: i32) -> Vec<(ResourceRole, ImageLocator)>;

    /// Picture for the front slot, effects applied
    fn render(&mut self) -> Option<Arc<Frame>>;

    fn effects(&self) -> EffectParams {
        EffectParams::default()
    }

    /// Update effect parameters. Returns false if this window takes none.
    fn set_effects(&mut self, _params: EffectParams) -> bool {
        false
    }

    fn kind(&self) -> VariantKind {
        self.core().kind
    }

    fn buffers(&self) -> &BufferPair {
        &self.core().pair
    }

    /// Frame currently on screen
    fn displayed_frame(&self) -> Option<i32> {
        // Only complete slots are ever flipped to front
        self.buffers().front().frame()
    }

    /// Whether showing `frame` requires loading anything
    fn needs_load(&self, frame: i32) -> bool {
        let front = self.buffers().front();
        !(front.frame() == Some(frame) && front.is_complete(&self.required_roles()))
    }

    /// Navigate to `frame`: issue its loads into the back slot, retrying
    /// roles that failed before. Returns the number of loads issued; zero
    /// when the back slot is busy or already holds them.
    fn request(&mut self, frame: i32, now: Instant) -> usize {
        self.issue_loads(frame, now, true)
    }

    /// Issue only loads the back slot lacks for `frame`; failed roles stay
    /// failed. For deferred re-requests and the Alpha base toggle.
    fn request_missing(&mut self, frame: i32, now: Instant) -> usize {
        self.issue_loads(frame, now, false)
    }

    fn issue_loads(&mut self, frame: i32, now: Instant, retry_failed: bool) -> usize {
        if !self.needs_load(frame) {
            trace!("{}: frame {} already displayed", self.kind(), frame);
            return 0;
        }
        let requests = self.locators(frame);
        let core = self.core_mut();
        let plan = if retry_failed {
            core.pair.request_load(frame, &requests, now)
        } else {
            core.pair.supplement_load(frame, &requests, now)
        };

        for (_, locator) in &plan.unresolved {
            core.report(
                ErrorKind::UnresolvedComponent,
                frame,
                locator,
                format!("no base path for {}", locator.kind()),
            );
        }
        for (role, locator) in &plan.issue {
            core.fetcher.fetch(LoadTicket {
                epoch: core.epoch,
                window: core.kind,
                slot: plan.slot,
                role: *role,
                locator: locator.clone(),
            });
        }

        let issued = plan.issue.len();
        if issued == 0 && !core.pair.back().is_busy() {
            // Back slot may already hold everything (carried or earlier stale load)
            self.try_swap(plan.slot);
        }
        issued
    }

    /// Apply a completion. `current` is the staleness guard's verdict.
    /// Returns true if the window flipped to a new frame.
    fn complete(&mut self, ticket: &LoadTicket, result: Result<Arc<Frame>, FrameError>, current: bool) -> bool {
        let (image, error) = match result {
            Ok(image) => (Some(image), None),
            Err(e) => (None, Some(e)),
        };
        let core = self.core_mut();
        if !core.pair.complete(ticket.slot, ticket.role, &ticket.locator, image) {
            trace!("{}: no pending load for {}", core.kind, ticket.locator);
            return false;
        }
        if !current {
            debug!("{}: discarding stale frame {}", core.kind, ticket.frame());
            return false;
        }
        if let Some(e) = error {
            let kind = if e.is_not_found() {
                ErrorKind::ResourceNotFound
            } else {
                ErrorKind::DecodeFailed
            };
            core.report(kind, ticket.frame(), &ticket.locator, e.to_string());
            return false;
        }
        self.try_swap(ticket.slot)
    }

    /// Readiness check for `slot`, flipping if it is complete
    fn try_swap(&mut self, slot: usize) -> bool {
        let required = self.required_roles();
        self.core_mut().pair.on_slot_ready(slot, &required)
    }

    /// Fail loads in flight longer than `timeout`. Only loads of
    /// `requested` are reported; older ones are stale anyway.
    fn expire(&mut self, now: Instant, timeout: Duration, requested: Option<i32>) -> usize {
        let core = self.core_mut();
        let expired = core.pair.expire(now, timeout);
        for resource in &expired {
            let frame = resource.locator.frame();
            if requested == Some(frame) {
                core.report(
                    ErrorKind::LoadTimeout,
                    frame,
                    &resource.locator,
                    format!("no result after {} ms", timeout.as_millis()),
                );
            } else {
                debug!("{}: stale load timed out: {}", core.kind, resource.locator);
            }
        }
        expired.len()
    }

    /// Locators worth warming in the cache for `frame`
    fn prefetch_locators(&self, frame: i32) -> Vec<ImageLocator> {
        self.locators(frame)
            .into_iter()
            .map(|(_, locator)| locator)
            .filter(|locator| !locator.is_empty())
            .collect()
    }
}

/// Loader of one displayed window
#[enum_dispatch(FrameLoader)]
pub enum VariantLoader {
    Plain(PlainLoader),
    Difference(DifferenceLoader),
    Alpha(AlphaLoader),
}

impl VariantLoader {
    /// Build the loader matching `kind`
    pub fn build(core: LoaderCore, effects: EffectParams, alpha_base: AlphaBase) -> Self {
        match core.kind {
            VariantKind::Original | VariantKind::Test => PlainLoader { core }.into(),
            VariantKind::Difference => DifferenceLoader::new(core, effects).into(),
            VariantKind::Alpha => AlphaLoader::new(core, effects, alpha_base).into(),
        }
    }

    pub fn as_alpha_mut(&mut self) -> Option<&mut AlphaLoader> {
        match self {
            VariantLoader::Alpha(alpha) => Some(alpha),
            _ => None,
        }
    }

    pub fn as_alpha(&self) -> Option<&AlphaLoader> {
        match self {
            VariantLoader::Alpha(alpha) => Some(alpha),
            _ => None,
        }
    }
}

// --- Original / Test ---

/// Original or Test window: one image per frame, no effects
pub struct PlainLoader {
    core: LoaderCore,
}

impl FrameLoader for PlainLoader {
    fn core(&self) -> &LoaderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LoaderCore {
        &mut self.core
    }

    fn required_roles(&self) -> Vec<ResourceRole> {
        vec![ResourceRole::Primary]
    }

    fn locators(&self, frame: i32) -> Vec<(ResourceRole, ImageLocator)> {
        vec![(ResourceRole::Primary, self.core.locator(frame, self.core.kind))]
    }

    fn render(&mut self) -> Option<Arc<Frame>> {
        self.core.pair.front().image(ResourceRole::Primary).cloned()
    }
}

// --- Difference ---

/// Rendered picture with the inputs it was made from
struct Rendered {
    swaps: u64,
    base: ResourceRole,
    params: EffectParams,
    frame: Arc<Frame>,
}

impl Rendered {
    fn matches(&self, swaps: u64, base: ResourceRole, params: &EffectParams) -> bool {
        self.swaps == swaps && self.base == base && self.params == *params
    }
}

/// Difference window: one image through the HSL filter
pub struct DifferenceLoader {
    core: LoaderCore,
    params: EffectParams,
    rendered: Option<Rendered>,
}

impl DifferenceLoader {
    pub fn new(core: LoaderCore, params: EffectParams) -> Self {
        Self {
            core,
            params: params.clamped(),
            rendered: None,
        }
    }
}

impl FrameLoader for DifferenceLoader {
    fn core(&self) -> &LoaderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LoaderCore {
        &mut self.core
    }

    fn required_roles(&self) -> Vec<ResourceRole> {
        vec![ResourceRole::Primary]
    }

    fn locators(&self, frame: i32) -> Vec<(ResourceRole, ImageLocator)> {
        vec![(ResourceRole::Primary, self.core.locator(frame, VariantKind::Difference))]
    }

    fn render(&mut self) -> Option<Arc<Frame>> {
        let source = self.core.pair.front().image(ResourceRole::Primary)?.clone();
        if self.params.is_neutral_color() {
            return Some(source);
        }
        let swaps = self.core.pair.swap_count();
        if let Some(r) = &self.rendered {
            if r.matches(swaps, ResourceRole::Primary, &self.params) {
                return Some(Arc::clone(&r.frame));
            }
        }
        let frame = Arc::new(hsl::apply(&source, &self.params));
        self.rendered = Some(Rendered {
            swaps,
            base: ResourceRole::Primary,
            params: self.params,
            frame: Arc::clone(&frame),
        });
        Some(frame)
    }

    fn effects(&self) -> EffectParams {
        self.params
    }

    fn set_effects(&mut self, params: EffectParams) -> bool {
        // Opacity belongs to the Alpha window only
        self.params = EffectParams {
            opacity: 1.0,
            ..params.clamped()
        };
        true
    }
}

// --- Alpha ---

/// Alpha window: selected base masked by the Alpha image
pub struct AlphaLoader {
    core: LoaderCore,
    params: EffectParams,
    base: AlphaBase,
    rendered: Option<Rendered>,
}

impl AlphaLoader {
    pub fn new(core: LoaderCore, params: EffectParams, base: AlphaBase) -> Self {
        Self {
            core,
            params: params.clamped(),
            base,
            rendered: None,
        }
    }

    /// Base currently selected by the A/B switch
    pub fn base(&self) -> AlphaBase {
        self.base
    }

    /// Flip the A/B switch. The caller re-requests the current frame, which
    /// loads the new base only if the front slot lacks it.
    pub fn toggle_base(&mut self) -> AlphaBase {
        self.base = self.base.toggled();
        debug!("Alpha: base -> {:?}", self.base);
        self.base
    }

    /// Base actually on screen: the selected one if loaded, else the other
    pub fn shown_base(&self) -> Option<AlphaBase> {
        let front = self.core.pair.front();
        [self.base, self.base.toggled()]
            .into_iter()
            .find(|&b| front.image(ResourceRole::for_base(b)).is_some())
    }
}

impl FrameLoader for AlphaLoader {
    fn core(&self) -> &LoaderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LoaderCore {
        &mut self.core
    }

    fn required_roles(&self) -> Vec<ResourceRole> {
        vec![ResourceRole::for_base(self.base), ResourceRole::Mask]
    }

    fn locators(&self, frame: i32) -> Vec<(ResourceRole, ImageLocator)> {
        vec![
            (
                ResourceRole::for_base(self.base),
                self.core.locator(frame, self.base.variant()),
            ),
            (ResourceRole::Mask, self.core.locator(frame, VariantKind::Alpha)),
        ]
    }

    fn render(&mut self) -> Option<Arc<Frame>> {
        let shown = self.shown_base()?;
        let role = ResourceRole::for_base(shown);
        let front = self.core.pair.front();
        let base = front.image(role)?.clone();
        let mask = front.image(ResourceRole::Mask)?.clone();

        let swaps = self.core.pair.swap_count();
        if let Some(r) = &self.rendered {
            if r.matches(swaps, role, &self.params) {
                return Some(Arc::clone(&r.frame));
            }
        }
        let frame = Arc::new(composite::masked(&base, &mask, &self.params));
        self.rendered = Some(Rendered {
            swaps,
            base: role,
            params: self.params,
            frame: Arc::clone(&frame),
        });
        Some(frame)
    }

    fn effects(&self) -> EffectParams {
        self.params
    }

    fn set_effects(&mut self, params: EffectParams) -> bool {
        self.params = params.clamped();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::LoadState;
    use crate::core::error_sink::testing::CollectingSink;
    use crate::core::fetch::testing::RecordingFetcher;

    fn paths() -> VariantPaths {
        VariantPaths {
            original: "/r/orig/".into(),
            test: "/r/test/".into(),
            difference: "/r/diff/".into(),
            alpha: "/r/alpha/".into(),
        }
    }

    fn loader(kind: VariantKind) -> (VariantLoader, Arc<CollectingSink>, Arc<RecordingFetcher>) {
        let sink = Arc::new(CollectingSink::default());
        let fetcher = Arc::new(RecordingFetcher::default());
        let core = LoaderCore::new(kind, paths(), 1, sink.clone(), fetcher.clone());
        (
            VariantLoader::build(core, EffectParams::default(), AlphaBase::Test),
            sink,
            fetcher,
        )
    }

    fn solid(rgba: [u8; 4]) -> Result<Arc<Frame>, FrameError> {
        Ok(Arc::new(Frame::filled(2, 2, rgba)))
    }

    #[test]
    fn test_plain_request_and_swap() {
        let (mut l, sink, fetcher) = loader(VariantKind::Original);
        assert_eq!(l.request(5, Instant::now()), 1);
        let tickets = fetcher.take_fetched();
        assert_eq!(tickets[0].locator.as_str(), "/r/orig/0005.jpg");
        assert_eq!(tickets[0].epoch, 1);

        assert!(l.complete(&tickets[0], solid([1, 2, 3, 255]), true));
        assert_eq!(l.displayed_frame(), Some(5));
        assert_eq!(l.render().unwrap().pixel(0, 0), [1, 2, 3, 255]);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_stale_completion_discarded_silently() {
        let (mut l, sink, fetcher) = loader(VariantKind::Test);
        l.request(10, Instant::now());
        let ticket = fetcher.take_fetched().remove(0);
        let path = ticket.locator.path().to_path_buf();
        assert!(!l.complete(&ticket, Err(FrameError::NotFound(path)), false));
        assert_eq!(l.displayed_frame(), None);
        assert!(sink.take().is_empty());
        // slot no longer busy, next request may issue
        assert_eq!(l.request(12, Instant::now()), 1);
    }

    #[test]
    fn test_not_found_reported_once() {
        let (mut l, sink, fetcher) = loader(VariantKind::Difference);
        l.request(3, Instant::now());
        let ticket = fetcher.take_fetched().remove(0);
        let path = ticket.locator.path().to_path_buf();
        l.complete(&ticket, Err(FrameError::NotFound(path)), true);

        let reports = sink.take();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ErrorKind::ResourceNotFound);
        assert_eq!(reports[0].window, VariantKind::Difference);
        assert_eq!(reports[0].frame, 3);

        // deferred re-request: no automatic retry
        assert_eq!(l.request_missing(3, Instant::now()), 0);
        assert!(sink.take().is_empty());
        // navigating to the frame again retries it
        assert_eq!(l.request(3, Instant::now()), 1);
    }

    #[test]
    fn test_decode_failure_kind() {
        let (mut l, sink, fetcher) = loader(VariantKind::Test);
        l.request(1, Instant::now());
        let ticket = fetcher.take_fetched().remove(0);
        l.complete(&ticket, Err(FrameError::Image("truncated".into())), true);
        assert_eq!(sink.take()[0].kind, ErrorKind::DecodeFailed);
    }

    #[test]
    fn test_difference_effects_rerender_without_load() {
        let (mut l, _sink, fetcher) = loader(VariantKind::Difference);
        l.request(1, Instant::now());
        let ticket = fetcher.take_fetched().remove(0);
        l.complete(&ticket, solid([200, 40, 40, 255]), true);

        let plain = l.render().unwrap();
        assert_eq!(plain.pixel(0, 0), [200, 40, 40, 255]);

        assert!(l.set_effects(EffectParams::new(0.0, -1.0, 0.0, 0.3)));
        let gray = l.render().unwrap();
        let px = gray.pixel(0, 0);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        // opacity is not a Difference parameter
        assert_eq!(l.effects().opacity, 1.0);
        assert!(Arc::ptr_eq(&gray, &l.render().unwrap()));
        assert!(fetcher.take_fetched().is_empty());
    }

    #[test]
    fn test_plain_ignores_effects() {
        let (mut l, _, _) = loader(VariantKind::Original);
        assert!(!l.set_effects(EffectParams::new(0.5, 0.5, 0.5, 0.5)));
        assert_eq!(l.effects(), EffectParams::default());
    }

    #[test]
    fn test_alpha_loads_selected_base_and_mask_only() {
        let (mut l, _, fetcher) = loader(VariantKind::Alpha);
        assert_eq!(l.request(100, Instant::now()), 2);
        let paths: Vec<String> = fetcher
            .take_fetched()
            .iter()
            .map(|t| t.locator.as_str().to_string())
            .collect();
        assert_eq!(paths, vec!["/r/test/0100.jpg", "/r/alpha/0100.png"]);
    }

    #[test]
    fn test_alpha_toggle_loads_missing_base_only() {
        let (mut l, _, fetcher) = loader(VariantKind::Alpha);
        l.request(100, Instant::now());
        for t in fetcher.take_fetched() {
            l.complete(&t, solid([255, 255, 255, 255]), true);
        }
        assert_eq!(l.displayed_frame(), Some(100));

        l.as_alpha_mut().unwrap().toggle_base();
        // front lacks Original: falls back to Test while it loads
        assert_eq!(l.as_alpha().unwrap().shown_base(), Some(AlphaBase::Test));
        assert!(l.render().is_some());

        assert_eq!(l.request(100, Instant::now()), 1);
        let tickets = fetcher.take_fetched();
        assert_eq!(tickets[0].role, ResourceRole::BaseOriginal);
        assert_eq!(tickets[0].locator.as_str(), "/r/orig/0100.jpg");
        assert_eq!(l.buffers().back().state_of(ResourceRole::BaseTest), LoadState::Ready);

        assert!(l.complete(&tickets[0], solid([0, 0, 255, 255]), true));
        assert_eq!(l.as_alpha().unwrap().shown_base(), Some(AlphaBase::Original));

        // toggling back needs nothing new
        l.as_alpha_mut().unwrap().toggle_base();
        assert_eq!(l.request(100, Instant::now()), 0);
        assert!(fetcher.take_fetched().is_empty());
    }

    #[test]
    fn test_alpha_mask_failure_keeps_front() {
        let (mut l, sink, fetcher) = loader(VariantKind::Alpha);
        l.request(1, Instant::now());
        for t in fetcher.take_fetched() {
            l.complete(&t, solid([9, 9, 9, 255]), true);
        }

        l.request(2, Instant::now());
        for t in fetcher.take_fetched() {
            let result = if t.role == ResourceRole::Mask {
                Err(FrameError::NotFound(t.locator.path().to_path_buf()))
            } else {
                solid([1, 1, 1, 255])
            };
            l.complete(&t, result, true);
        }
        assert_eq!(l.displayed_frame(), Some(1));
        let reports = sink.take();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].window, VariantKind::Alpha);
        assert_eq!(reports[0].frame, 2);
    }

    #[test]
    fn test_empty_base_path_is_unresolved() {
        let sink = Arc::new(CollectingSink::default());
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut p = paths();
        p.difference.clear();
        let core = LoaderCore::new(VariantKind::Difference, p, 0, sink.clone(), fetcher.clone());
        let mut l = VariantLoader::build(core, EffectParams::default(), AlphaBase::Test);

        assert_eq!(l.request(4, Instant::now()), 0);
        assert!(fetcher.take_fetched().is_empty());
        let reports = sink.take();
        assert_eq!(reports[0].kind, ErrorKind::UnresolvedComponent);
        assert!(!reports[0].kind.is_user_visible());
    }

    #[test]
    fn test_timeout_reports_current_frame_only() {
        let (mut l, sink, _) = loader(VariantKind::Test);
        let start = Instant::now();
        l.request(8, start);
        let later = start + Duration::from_secs(11);
        assert_eq!(l.expire(later, Duration::from_secs(10), Some(8)), 1);
        let reports = sink.take();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ErrorKind::LoadTimeout);

        l.request(9, later);
        assert_eq!(l.expire(later + Duration::from_secs(11), Duration::from_secs(10), Some(10)), 1);
        assert!(sink.take().is_empty());
    }
}
