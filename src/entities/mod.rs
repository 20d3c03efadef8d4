//! Entities - data types shared by the engine and the UI
//!
//! - `variant`: image variant kinds and the extension table
//! - `event`: event descriptor (frame range, base paths, scores)
//! - `frame` / `loader`: decoded RGBA8 image and its disk loader
//! - `effects`: post-load hue/saturation/lightness/opacity
//! - `chart`: per-frame score series with the guide marker

pub mod chart;
pub mod effects;
pub mod event;
pub mod frame;
pub mod loader;
pub mod variant;

pub use chart::ScoreChart;
pub use effects::EffectParams;
pub use event::{EventError, EventInfo, ScorePoint, VariantPaths};
pub use frame::{Frame, FrameError};
pub use loader::Loader;
pub use variant::{AlphaBase, VariantKind};
