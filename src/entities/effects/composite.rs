//! Alpha window compositing: base image masked by the alpha mask.
//!
//! Output alpha = base alpha * mask alpha * opacity. Colour comes from the
//! base, adjusted by hue/saturation/lightness. A mask with a different
//! resolution is sampled nearest-neighbour onto the base grid.

use crate::entities::effects::{hsl, EffectParams};
use crate::entities::frame::Frame;

/// Composite `base` under `mask` and apply all four effect parameters
pub fn masked(base: &Frame, mask: &Frame, params: &EffectParams) -> Frame {
    let (width, height) = base.resolution();
    let adjust_color = !params.is_neutral_color();
    let opacity = params.opacity.clamp(0.0, 1.0);

    let mut out = Vec::with_capacity(base.pixels().len());
    for y in 0..height {
        for x in 0..width {
            let [r, g, b, a] = base.pixel(x, y);
            let coverage = mask.sample_scaled(x, y, width, height)[3] as f32 / 255.0;

            let rgb = if adjust_color {
                hsl::adjust_pixel([r, g, b], params)
            } else {
                [r, g, b]
            };
            let alpha = (a as f32 * coverage * opacity).round().clamp(0.0, 255.0) as u8;

            out.extend_from_slice(&rgb);
            out.push(alpha);
        }
    }

    Frame::from_rgba8(width, height, out).unwrap_or_else(|_| base.clone())
}
