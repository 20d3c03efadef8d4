//! HSL (Hue, Saturation, Lightness) adjustment.
//!
//! Converts RGB to HSL, applies adjustments, converts back.
//!
//! # Algorithm
//!
//! 1. Convert each pixel RGB -> HSL
//! 2. H += hue * 360 (wrap around 0-360)
//! 3. S scaled by (1 + saturation), clamped 0-1
//! 4. L pushed towards white (lightness > 0) or black (lightness < 0)
//! 5. Convert HSL -> RGB, alpha untouched

use crate::entities::effects::EffectParams;
use crate::entities::frame::Frame;

/// Apply hue/saturation/lightness to a frame. Opacity is ignored here.
pub fn apply(frame: &Frame, params: &EffectParams) -> Frame {
    if params.is_neutral_color() {
        return frame.clone();
    }

    let (width, height) = frame.resolution();
    let mut out = Vec::with_capacity(frame.pixels().len());
    for chunk in frame.pixels().chunks_exact(4) {
        let rgb = adjust_pixel([chunk[0], chunk[1], chunk[2]], params);
        out.extend_from_slice(&rgb);
        out.push(chunk[3]);
    }

    // Same resolution, same byte count: construction cannot fail
    Frame::from_rgba8(width, height, out).unwrap_or_else(|_| frame.clone())
}

/// Adjust one RGB8 pixel
pub fn adjust_pixel(rgb: [u8; 3], params: &EffectParams) -> [u8; 3] {
    let r = rgb[0] as f32 / 255.0;
    let g = rgb[1] as f32 / 255.0;
    let b = rgb[2] as f32 / 255.0;

    let (h, s, l) = rgb_to_hsl(r, g, b);

    let h_new = (h + params.hue * 360.0).rem_euclid(360.0);
    let s_new = (s * (1.0 + params.saturation)).clamp(0.0, 1.0);
    let l_new = if params.lightness >= 0.0 {
        l + (1.0 - l) * params.lightness
    } else {
        l * (1.0 + params.lightness)
    }
    .clamp(0.0, 1.0);

    let (r_out, g_out, b_out) = hsl_to_rgb(h_new, s_new, l_new);
    [to_u8(r_out), to_u8(g_out), to_u8(b_out)]
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert RGB (0..1) to HSL (H: 0..360, S: 0..1, L: 0..1)
fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let l = (max + min) / 2.0;

    if delta.abs() < 0.0001 {
        // Achromatic (gray)
        return (0.0, 0.0, l);
    }

    let s = delta / (1.0 - (2.0 * l - 1.0).abs());

    let h = if (max - r).abs() < 0.0001 {
        60.0 * (((g - b) / delta) % 6.0)
    } else if (max - g).abs() < 0.0001 {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s.clamp(0.0, 1.0), l)
}

/// Convert HSL to RGB (0..1)
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s <= 0.0 {
        return (l, l, l);
    }

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());
    let m = l - c / 2.0;

    let (r1, g1, b1) = match h_prime as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (r1 + m, g1 + m, b1 + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_hsl_roundtrip_red() {
        let (h, s, l) = rgb_to_hsl(1.0, 0.0, 0.0);
        assert!(h.abs() < 1.0);
        assert!((s - 1.0).abs() < 0.01);
        assert!((l - 0.5).abs() < 0.01);

        let (r, g, b) = hsl_to_rgb(h, s, l);
        assert!((r - 1.0).abs() < 0.01);
        assert!(g.abs() < 0.01);
        assert!(b.abs() < 0.01);
    }

    #[test]
    fn test_hue_third_turn_red_to_green() {
        let params = EffectParams::new(1.0 / 3.0, 0.0, 0.0, 1.0);
        let [r, g, b] = adjust_pixel([255, 0, 0], &params);
        assert!(g > r);
        assert!(g > b);
    }

    #[test]
    fn test_full_desaturation_is_gray() {
        let params = EffectParams::new(0.0, -1.0, 0.0, 1.0);
        let [r, g, b] = adjust_pixel([200, 40, 90], &params);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_lightness_extremes() {
        let white = EffectParams::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(adjust_pixel([12, 80, 200], &white), [255, 255, 255]);
        let black = EffectParams::new(0.0, 0.0, -1.0, 1.0);
        assert_eq!(adjust_pixel([12, 80, 200], &black), [0, 0, 0]);
    }

    #[test]
    fn test_neutral_returns_same_pixels_and_keeps_alpha() {
        let frame = Frame::filled(2, 2, [10, 20, 30, 77]);
        assert_eq!(apply(&frame, &EffectParams::default()), frame);

        let shifted = apply(&frame, &EffectParams::new(0.5, 0.0, 0.0, 1.0));
        assert_eq!(shifted.pixel(1, 1)[3], 77);
        assert_ne!(shifted.pixel(1, 1), frame.pixel(1, 1));
    }
}
