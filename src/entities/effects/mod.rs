//! Post-load colour effects for comparison windows.
//!
//! Effects never touch buffer state: they run on the front slot's decoded
//! image at render time, so slider changes re-render without a reload.
//!
//! | Window | hue | saturation | lightness | opacity |
//! |--------|-----|------------|-----------|---------|
//! | Original / Test | - | - | - | - |
//! | Difference | yes | yes | yes | - |
//! | Alpha | yes | yes | yes | yes |
//!
//! # Parameter ranges
//!
//! - `hue`: -1.0..1.0, fraction of a full turn on the colour wheel
//! - `saturation`: -1.0 (grayscale) .. 1.0 (double), 0.0 = no change
//! - `lightness`: -1.0 (black) .. 1.0 (white), 0.0 = no change
//! - `opacity`: 0.0..1.0

pub mod composite;
pub mod hsl;

use serde::{Deserialize, Serialize};

/// Hue / saturation / lightness / opacity applied after load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub opacity: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 0.0,
            lightness: 0.0,
            opacity: 1.0,
        }
    }
}

impl EffectParams {
    pub fn new(hue: f32, saturation: f32, lightness: f32, opacity: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
            opacity,
        }
        .clamped()
    }

    /// Clamp every parameter into its documented range
    pub fn clamped(self) -> Self {
        Self {
            hue: self.hue.clamp(-1.0, 1.0),
            saturation: self.saturation.clamp(-1.0, 1.0),
            lightness: self.lightness.clamp(-1.0, 1.0),
            opacity: self.opacity.clamp(0.0, 1.0),
        }
    }

    /// True when hue/saturation/lightness are all neutral
    pub fn is_neutral_color(&self) -> bool {
        self.hue.abs() < 0.0005 && self.saturation.abs() < 0.0005 && self.lightness.abs() < 0.0005
    }
}
