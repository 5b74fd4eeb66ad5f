//! Color-space conversions and tone adjustments.
//!
//! Color-space conversions write the target channels into the RGB slots
//! using the usual 8-bit encodings: HSV as `(H/2, S, V)` with hue in
//! `0..180`, and Lab as `(L*255/100, a+128, b+128)`.

use super::histogram::Histogram;
use super::KernelError;
use crate::operation::ColorOp;
use crate::raster::RasterImage;

// D65 reference white.
const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;

pub fn apply(image: &RasterImage, op: &ColorOp) -> Result<RasterImage, KernelError> {
    let out = match *op {
        ColorOp::RgbToHsv => image.map_pixels(rgb_to_hsv),
        ColorOp::RgbToLab => {
            let lut = srgb_to_linear_lut();
            image.map_pixels(|px| rgb_to_lab(px, &lut))
        }
        ColorOp::Gamma { gamma } => {
            let lut = gamma_lut(gamma);
            image.map_pixels(|px| px.map(|v| lut[v as usize]))
        }
        ColorOp::Equalize => {
            let lut = Histogram::from_values(image.pixels()).equalization_lut();
            image.map_pixels(|px| px.map(|v| lut[v as usize]))
        }
        ColorOp::AutoContrast => autocontrast(image),
    };
    Ok(out)
}

/// 8-bit HSV of one pixel.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round();
    // 360 degrees wraps back to hue 0.
    let h = if h >= 180.0 { 0.0 } else { h };
    [h as u8, s.round() as u8, v as u8]
}

/// 8-bit CIE Lab of one sRGB pixel.
pub fn rgb_to_lab(px: [u8; 3], linear: &[f32; 256]) -> [u8; 3] {
    let [r, g, b] = px.map(|v| linear[v as usize]);

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

    let f = |t: f32| {
        if t > 0.008_856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };
    let (fx, fy, fz) = (f(x), f(y), f(z));

    let l = if y > 0.008_856 {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (fx - fy) + 128.0;
    let b = 200.0 * (fy - fz) + 128.0;

    [
        (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
        a.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

fn srgb_to_linear_lut() -> [f32; 256] {
    let mut lut = [0f32; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        let c = v as f32 / 255.0;
        *slot = if c <= 0.040_45 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }
    lut
}

/// `((v / 255) ^ gamma) * 255`, truncated.
pub fn gamma_lut(gamma: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        let out = (v as f64 / 255.0).powf(gamma) * 255.0;
        // Nudge past representation error so gamma 1.0 is the identity.
        *slot = (out + 1e-9).clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Stretch the image's value range to the full 0-255 range.
pub fn autocontrast(image: &RasterImage) -> RasterImage {
    let Some((lo, hi)) = Histogram::from_values(image.pixels()).range() else {
        return image.clone();
    };
    if lo == hi {
        return image.clone();
    }
    let span = (hi - lo) as f32;
    image.map_pixels(|px| {
        px.map(|v| ((v.saturating_sub(lo)) as f32 * 255.0 / span).round().clamp(0.0, 255.0) as u8)
    })
}
