//! Double buffer ("front"/"back") for one comparison window.
//!
//! **Why**: Reloading the visible image on every frame change blanks the
//! window while the new file decodes. Instead the next frame loads into the
//! hidden back slot and the pair flips only once everything that slot needs
//! is Ready.
//!
//! # Invariants
//!
//! - Exactly one slot is front. The flip is a single index assignment.
//! - Loads are only issued into the back slot, and only while the back slot
//!   has nothing in flight: at most one load set per window is pending.
//! - The front slot never returns to Empty while another frame loads, and a
//!   failed back slot never flips, so the display never regresses to blank.
//! - Resources of one slot complete in any order; the readiness check runs on
//!   every completion and the flip happens on whichever one completes the set.

use log::{debug, trace};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::resolver::ImageLocator;
use crate::entities::{AlphaBase, Frame, VariantKind};

/// Role of one image inside a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRole {
    /// Single image of Original / Test / Difference windows
    Primary,
    /// Original render under the Alpha mask
    BaseOriginal,
    /// Test render under the Alpha mask
    BaseTest,
    /// Alpha mask
    Mask,
}

impl ResourceRole {
    pub fn for_base(base: AlphaBase) -> Self {
        match base {
            AlphaBase::Original => ResourceRole::BaseOriginal,
            AlphaBase::Test => ResourceRole::BaseTest,
        }
    }
}

/// Load state of a resource (or of a slot, aggregated over required roles)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Loading,
    Ready,
    Failed,
}

/// One image of a slot
#[derive(Debug, Clone)]
pub struct Resource {
    pub role: ResourceRole,
    pub locator: ImageLocator,
    pub state: LoadState,
    pub image: Option<Arc<Frame>>,
    issued_at: Option<Instant>,
}

/// One half of a buffer pair
#[derive(Debug, Clone, Default)]
pub struct BufferSlot {
    frame: Option<i32>,
    resources: Vec<Resource>,
    visible: bool,
}

impl BufferSlot {
    /// Frame this slot holds (or is loading)
    pub fn frame(&self) -> Option<i32> {
        self.frame
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, role: ResourceRole) -> Option<&Resource> {
        self.resources.iter().find(|r| r.role == role)
    }

    fn resource_mut(&mut self, role: ResourceRole) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.role == role)
    }

    pub fn state_of(&self, role: ResourceRole) -> LoadState {
        self.resource(role).map(|r| r.state).unwrap_or(LoadState::Empty)
    }

    /// Decoded image for `role`, if Ready
    pub fn image(&self, role: ResourceRole) -> Option<&Arc<Frame>> {
        self.resource(role)
            .filter(|r| r.state == LoadState::Ready)
            .and_then(|r| r.image.as_ref())
    }

    /// Any resource still in flight
    pub fn is_busy(&self) -> bool {
        self.resources.iter().any(|r| r.state == LoadState::Loading)
    }

    /// Aggregate state over `required` roles
    pub fn load_state(&self, required: &[ResourceRole]) -> LoadState {
        let states: Vec<LoadState> = required.iter().map(|&role| self.state_of(role)).collect();
        if !states.is_empty() && states.iter().all(|&s| s == LoadState::Ready) {
            LoadState::Ready
        } else if states.contains(&LoadState::Failed) {
            LoadState::Failed
        } else if states.contains(&LoadState::Loading) {
            LoadState::Loading
        } else {
            LoadState::Empty
        }
    }

    /// Every required role Ready with a non-empty locator
    pub fn is_complete(&self, required: &[ResourceRole]) -> bool {
        !required.is_empty()
            && required.iter().all(|&role| {
                self.resource(role)
                    .map(|r| r.state == LoadState::Ready && !r.locator.is_empty() && r.image.is_some())
                    .unwrap_or(false)
            })
    }

    fn reset(&mut self, frame: i32) {
        self.frame = Some(frame);
        self.resources.clear();
    }
}

/// Result of `BufferPair::request_load()`
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    /// Back slot index the loads target
    pub slot: usize,
    /// Loads to issue now
    pub issue: Vec<(ResourceRole, ImageLocator)>,
    /// Roles whose locator was empty (marked Failed, not issued)
    pub unresolved: Vec<(ResourceRole, ImageLocator)>,
}

impl LoadPlan {
    pub fn is_empty(&self) -> bool {
        self.issue.is_empty() && self.unresolved.is_empty()
    }
}

/// Two slots, one visible
#[derive(Debug, Clone)]
pub struct BufferPair {
    kind: VariantKind,
    slots: [BufferSlot; 2],
    front: usize,
    swaps: u64,
}

impl BufferPair {
    pub fn new(kind: VariantKind) -> Self {
        let mut slots: [BufferSlot; 2] = Default::default();
        slots[0].visible = true;
        Self {
            kind,
            slots,
            front: 0,
            swaps: 0,
        }
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    pub fn front_index(&self) -> usize {
        self.front
    }

    pub fn back_index(&self) -> usize {
        1 - self.front
    }

    pub fn front(&self) -> &BufferSlot {
        &self.slots[self.front]
    }

    pub fn back(&self) -> &BufferSlot {
        &self.slots[self.back_index()]
    }

    pub fn slot(&self, index: usize) -> Option<&BufferSlot> {
        self.slots.get(index)
    }

    /// Number of flips so far
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    /// Prepare the back slot for `frame` and work out which loads to issue.
    ///
    /// The front slot is never modified. When the back slot already targets
    /// `frame`, roles that are Ready or Loading are kept and Failed ones are
    /// issued again (navigating to a frame retries it). When the front slot
    /// shows `frame`, its Ready images are shared into the back slot instead
    /// of reloaded.
    pub fn request_load(
        &mut self,
        frame: i32,
        requests: &[(ResourceRole, ImageLocator)],
        now: Instant,
    ) -> LoadPlan {
        self.plan_load(frame, requests, now, true)
    }

    /// Like `request_load()`, but only adds roles the back slot does not hold
    /// at all. Failed roles stay Failed. Used for deferred re-requests and
    /// the Alpha base toggle, which must not turn one failure into a retry loop.
    pub fn supplement_load(
        &mut self,
        frame: i32,
        requests: &[(ResourceRole, ImageLocator)],
        now: Instant,
    ) -> LoadPlan {
        self.plan_load(frame, requests, now, false)
    }

    fn plan_load(
        &mut self,
        frame: i32,
        requests: &[(ResourceRole, ImageLocator)],
        now: Instant,
        retry_failed: bool,
    ) -> LoadPlan {
        let back_idx = self.back_index();
        let mut plan = LoadPlan {
            slot: back_idx,
            ..Default::default()
        };

        if self.slots[back_idx].is_busy() {
            trace!("{}: back slot busy, deferring frame {}", self.kind, frame);
            return plan;
        }

        if self.slots[back_idx].frame != Some(frame) {
            let carried: Vec<Resource> = if self.slots[self.front].frame == Some(frame) {
                self.slots[self.front]
                    .resources
                    .iter()
                    .filter(|r| r.state == LoadState::Ready)
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            let back = &mut self.slots[back_idx];
            back.reset(frame);
            back.resources.extend(carried);
        }

        let back = &mut self.slots[back_idx];
        for (role, locator) in requests {
            if let Some(existing) = back.resource(*role) {
                let retry = retry_failed && existing.state == LoadState::Failed;
                if existing.locator == *locator && !retry {
                    continue;
                }
            }
            back.resources.retain(|r| r.role != *role);

            if locator.is_empty() {
                back.resources.push(Resource {
                    role: *role,
                    locator: locator.clone(),
                    state: LoadState::Failed,
                    image: None,
                    issued_at: None,
                });
                plan.unresolved.push((*role, locator.clone()));
            } else {
                back.resources.push(Resource {
                    role: *role,
                    locator: locator.clone(),
                    state: LoadState::Loading,
                    image: None,
                    issued_at: Some(now),
                });
                plan.issue.push((*role, locator.clone()));
            }
        }

        if !plan.issue.is_empty() {
            debug!(
                "{}: loading frame {} into slot {} ({} resources)",
                self.kind,
                frame,
                back_idx,
                plan.issue.len()
            );
        }
        plan
    }

    /// Record a completion. Returns false if nothing in `slot` was waiting for it.
    pub fn complete(
        &mut self,
        slot: usize,
        role: ResourceRole,
        locator: &ImageLocator,
        image: Option<Arc<Frame>>,
    ) -> bool {
        let Some(target) = self.slots.get_mut(slot) else {
            return false;
        };
        let Some(resource) = target.resource_mut(role) else {
            return false;
        };
        if resource.locator != *locator || resource.state != LoadState::Loading {
            return false;
        }
        resource.issued_at = None;
        match image {
            Some(img) => {
                resource.state = LoadState::Ready;
                resource.image = Some(img);
            }
            None => {
                resource.state = LoadState::Failed;
                resource.image = None;
            }
        }
        true
    }

    /// Readiness check after a completion signal for `slot`.
    ///
    /// Flips front/back iff `slot` is the back slot, every `required` role
    /// is Ready with a non-empty locator and nothing else is still in flight.
    pub fn on_slot_ready(&mut self, slot: usize, required: &[ResourceRole]) -> bool {
        let back_idx = self.back_index();
        if slot != back_idx {
            return false;
        }
        let back = &self.slots[back_idx];
        if back.is_busy() || !back.is_complete(required) {
            return false;
        }

        self.slots[self.front].visible = false;
        self.slots[back_idx].visible = true;
        self.front = back_idx;
        self.swaps += 1;
        debug!(
            "{}: swapped to frame {:?} (slot {})",
            self.kind, self.slots[back_idx].frame, back_idx
        );
        true
    }

    /// Mark back-slot loads older than `timeout` as Failed. Returns the expired resources.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<Resource> {
        let back_idx = self.back_index();
        let mut expired = Vec::new();
        for resource in &mut self.slots[back_idx].resources {
            if resource.state != LoadState::Loading {
                continue;
            }
            if let Some(issued) = resource.issued_at {
                if now.saturating_duration_since(issued) >= timeout {
                    resource.state = LoadState::Failed;
                    resource.issued_at = None;
                    expired.push(resource.clone());
                }
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::resolve;

    fn loc(frame: i32) -> ImageLocator {
        resolve("/r/test/", frame, VariantKind::Test)
    }

    fn img() -> Option<Arc<Frame>> {
        Some(Arc::new(Frame::new(2, 2)))
    }

    const PRIMARY: &[ResourceRole] = &[ResourceRole::Primary];

    #[test]
    fn test_load_targets_back_slot_only() {
        let mut pair = BufferPair::new(VariantKind::Test);
        let now = Instant::now();
        let plan = pair.request_load(1, &[(ResourceRole::Primary, loc(1))], now);
        assert_eq!(plan.slot, pair.back_index());
        assert_eq!(plan.issue.len(), 1);
        assert_eq!(pair.front().state_of(ResourceRole::Primary), LoadState::Empty);
        assert_eq!(pair.back().state_of(ResourceRole::Primary), LoadState::Loading);
    }

    #[test]
    fn test_swap_on_ready() {
        let mut pair = BufferPair::new(VariantKind::Test);
        let plan = pair.request_load(1, &[(ResourceRole::Primary, loc(1))], Instant::now());
        assert!(pair.complete(plan.slot, ResourceRole::Primary, &loc(1), img()));
        assert!(pair.on_slot_ready(plan.slot, PRIMARY));
        assert_eq!(pair.front().frame(), Some(1));
        assert!(pair.front().is_visible());
        assert!(!pair.back().is_visible());
        assert_eq!(pair.swap_count(), 1);
    }

    #[test]
    fn test_failure_keeps_front() {
        let mut pair = BufferPair::new(VariantKind::Test);
        let plan = pair.request_load(1, &[(ResourceRole::Primary, loc(1))], Instant::now());
        pair.complete(plan.slot, ResourceRole::Primary, &loc(1), img());
        pair.on_slot_ready(plan.slot, PRIMARY);

        let plan = pair.request_load(2, &[(ResourceRole::Primary, loc(2))], Instant::now());
        pair.complete(plan.slot, ResourceRole::Primary, &loc(2), None);
        assert!(!pair.on_slot_ready(plan.slot, PRIMARY));
        assert_eq!(pair.front().frame(), Some(1));
        assert!(pair.front().image(ResourceRole::Primary).is_some());
        assert_eq!(pair.back().load_state(PRIMARY), LoadState::Failed);
    }

    #[test]
    fn test_busy_back_defers() {
        let mut pair = BufferPair::new(VariantKind::Test);
        let now = Instant::now();
        pair.request_load(1, &[(ResourceRole::Primary, loc(1))], now);
        let plan = pair.request_load(2, &[(ResourceRole::Primary, loc(2))], now);
        assert!(plan.is_empty());
        assert_eq!(pair.back().frame(), Some(1));
        // never both slots loading
        assert!(!pair.front().is_busy());
    }

    #[test]
    fn test_completion_for_front_slot_ignored() {
        let mut pair = BufferPair::new(VariantKind::Test);
        let front = pair.front_index();
        assert!(!pair.complete(front, ResourceRole::Primary, &loc(1), img()));
        assert!(!pair.on_slot_ready(front, PRIMARY));
    }

    #[test]
    fn test_out_of_order_completions() {
        let required = [ResourceRole::BaseTest, ResourceRole::Mask];
        let mask = resolve("/r/alpha/", 4, VariantKind::Alpha);
        let mut pair = BufferPair::new(VariantKind::Alpha);
        let plan = pair.request_load(
            4,
            &[(ResourceRole::BaseTest, loc(4)), (ResourceRole::Mask, mask.clone())],
            Instant::now(),
        );
        // mask first, then base
        pair.complete(plan.slot, ResourceRole::Mask, &mask, img());
        assert!(!pair.on_slot_ready(plan.slot, &required));
        pair.complete(plan.slot, ResourceRole::BaseTest, &loc(4), img());
        assert!(pair.on_slot_ready(plan.slot, &required));
    }

    #[test]
    fn test_empty_locator_never_swaps() {
        let mut pair = BufferPair::new(VariantKind::Difference);
        let empty = resolve("", 3, VariantKind::Difference);
        let plan = pair.request_load(3, &[(ResourceRole::Primary, empty)], Instant::now());
        assert!(plan.issue.is_empty());
        assert_eq!(plan.unresolved.len(), 1);
        assert!(!pair.on_slot_ready(plan.slot, PRIMARY));
    }

    #[test]
    fn test_front_images_shared_for_same_frame() {
        let mut pair = BufferPair::new(VariantKind::Alpha);
        let mask = resolve("/r/alpha/", 7, VariantKind::Alpha);
        let plan = pair.request_load(
            7,
            &[(ResourceRole::BaseTest, loc(7)), (ResourceRole::Mask, mask.clone())],
            Instant::now(),
        );
        pair.complete(plan.slot, ResourceRole::BaseTest, &loc(7), img());
        pair.complete(plan.slot, ResourceRole::Mask, &mask, img());
        pair.on_slot_ready(plan.slot, &[ResourceRole::BaseTest, ResourceRole::Mask]);

        let orig = resolve("/r/orig/", 7, VariantKind::Original);
        let plan = pair.request_load(
            7,
            &[
                (ResourceRole::BaseOriginal, orig.clone()),
                (ResourceRole::BaseTest, loc(7)),
                (ResourceRole::Mask, mask),
            ],
            Instant::now(),
        );
        assert_eq!(plan.issue, vec![(ResourceRole::BaseOriginal, orig)]);
        assert_eq!(pair.back().state_of(ResourceRole::BaseTest), LoadState::Ready);
    }

    #[test]
    fn test_failed_role_reissued_on_request_only() {
        let mut pair = BufferPair::new(VariantKind::Test);
        let now = Instant::now();
        let plan = pair.request_load(5, &[(ResourceRole::Primary, loc(5))], now);
        pair.complete(plan.slot, ResourceRole::Primary, &loc(5), None);

        let plan = pair.supplement_load(5, &[(ResourceRole::Primary, loc(5))], now);
        assert!(plan.issue.is_empty());
        assert_eq!(pair.back().state_of(ResourceRole::Primary), LoadState::Failed);

        let plan = pair.request_load(5, &[(ResourceRole::Primary, loc(5))], now);
        assert_eq!(plan.issue, vec![(ResourceRole::Primary, loc(5))]);
        assert_eq!(pair.back().state_of(ResourceRole::Primary), LoadState::Loading);
    }

    #[test]
    fn test_expire_marks_failed() {
        let mut pair = BufferPair::new(VariantKind::Test);
        let start = Instant::now();
        pair.request_load(1, &[(ResourceRole::Primary, loc(1))], start);
        assert!(pair.expire(start + Duration::from_millis(5), Duration::from_secs(1)).is_empty());
        let expired = pair.expire(start + Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(expired.len(), 1);
        assert!(!pair.back().is_busy());
        // late completion is ignored
        assert!(!pair.complete(pair.back_index(), ResourceRole::Primary, &loc(1), img()));
    }
}
