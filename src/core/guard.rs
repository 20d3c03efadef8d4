//! Frame staleness guard ("last write wins").
//!
//! Tracks the most recently requested frame per variant window. A load
//! completion whose originating frame no longer equals the live request is
//! discarded silently: no swap, no error. When scrubbing 10 -> 11 -> 12
//! faster than frame 10 decodes, only frame 12 may reach the screen.

use std::collections::HashMap;

use crate::entities::VariantKind;

#[derive(Debug, Clone, Default)]
pub struct FrameGuard {
    requested: HashMap<VariantKind, i32>,
}

impl FrameGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request. Returns false if it repeats the live request.
    pub fn request(&mut self, kind: VariantKind, frame: i32) -> bool {
        self.requested.insert(kind, frame) != Some(frame)
    }

    /// Most recent request for `kind`
    pub fn requested(&self, kind: VariantKind) -> Option<i32> {
        self.requested.get(&kind).copied()
    }

    /// Whether a completion for `frame` may still affect `kind`'s display
    pub fn is_current(&self, kind: VariantKind, frame: i32) -> bool {
        self.requested(kind) == Some(frame)
    }

    /// Forget everything (event close / re-open)
    pub fn clear(&mut self) {
        self.requested.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut guard = FrameGuard::new();
        guard.request(VariantKind::Test, 10);
        guard.request(VariantKind::Test, 11);
        guard.request(VariantKind::Test, 12);
        assert!(!guard.is_current(VariantKind::Test, 10));
        assert!(!guard.is_current(VariantKind::Test, 11));
        assert!(guard.is_current(VariantKind::Test, 12));
    }

    #[test]
    fn test_variants_are_independent() {
        let mut guard = FrameGuard::new();
        guard.request(VariantKind::Original, 5);
        guard.request(VariantKind::Difference, 9);
        assert!(guard.is_current(VariantKind::Original, 5));
        assert!(!guard.is_current(VariantKind::Original, 9));
        assert_eq!(guard.requested(VariantKind::Alpha), None);
    }

    #[test]
    fn test_repeat_request_reported() {
        let mut guard = FrameGuard::new();
        assert!(guard.request(VariantKind::Alpha, 3));
        assert!(!guard.request(VariantKind::Alpha, 3));
        assert!(guard.request(VariantKind::Alpha, 4));
    }
}
