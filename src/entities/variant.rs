//! Image variant kinds and their on-disk conventions.
//!
//! Every frame of an event exists in four aligned variants:
//! - **Original**: reference render
//! - **Test**: render under test
//! - **Difference**: per-pixel difference of the two
//! - **Alpha**: mask selecting the region of interest
//!
//! Original/Test/Difference are photographic (`jpg`), masks are `png`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Photographic extension (Original, Test, Difference)
pub const PHOTO_EXT: &str = "jpg";
/// Mask extension (Alpha)
pub const MASK_EXT: &str = "png";

/// Kind of image variant. Determines file extension and effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariantKind {
    Original,
    Test,
    Difference,
    Alpha,
}

impl VariantKind {
    pub const ALL: [VariantKind; 4] = [
        VariantKind::Original,
        VariantKind::Test,
        VariantKind::Difference,
        VariantKind::Alpha,
    ];

    /// File extension (without dot)
    pub fn extension(self) -> &'static str {
        match self {
            VariantKind::Original | VariantKind::Test | VariantKind::Difference => PHOTO_EXT,
            VariantKind::Alpha => MASK_EXT,
        }
    }

    /// Human-readable label for window titles and messages
    pub fn label(self) -> &'static str {
        match self {
            VariantKind::Original => "Original",
            VariantKind::Test => "Test",
            VariantKind::Difference => "Difference",
            VariantKind::Alpha => "Alpha",
        }
    }

    /// Whether hue/saturation/lightness parameters affect this variant's window
    pub fn takes_color_effects(self) -> bool {
        matches!(self, VariantKind::Difference | VariantKind::Alpha)
    }

    /// Whether the opacity parameter affects this variant's window
    pub fn takes_opacity(self) -> bool {
        self == VariantKind::Alpha
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Base image shown under the Alpha mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AlphaBase {
    Original,
    #[default]
    Test,
}

impl AlphaBase {
    /// The other base (A/B switch)
    pub fn toggled(self) -> Self {
        match self {
            AlphaBase::Original => AlphaBase::Test,
            AlphaBase::Test => AlphaBase::Original,
        }
    }

    /// Variant whose files back this base
    pub fn variant(self) -> VariantKind {
        match self {
            AlphaBase::Original => VariantKind::Original,
            AlphaBase::Test => VariantKind::Test,
        }
    }
}
