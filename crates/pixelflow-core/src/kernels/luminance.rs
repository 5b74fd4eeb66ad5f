//! Grayscale conversion using ITU-R BT.601 coefficients.
//!
//! BT.601 is the weighting every gray-based kernel (threshold, edge,
//! cartoon mask) works from.

use crate::raster::RasterImage;

/// BT.601 coefficient for the red channel.
pub const LUMA_R: f32 = 0.299;

/// BT.601 coefficient for the green channel.
pub const LUMA_G: f32 = 0.587;

/// BT.601 coefficient for the blue channel.
pub const LUMA_B: f32 = 0.114;

/// Luma of an 8-bit RGB triple (0-255).
#[inline]
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    let lum = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
    lum.clamp(0.0, 255.0).round() as u8
}

/// One luma byte per pixel, row-major.
pub fn to_gray(image: &RasterImage) -> Vec<u8> {
    image
        .pixels()
        .chunks_exact(3)
        .map(|px| luma_u8(px[0], px[1], px[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coefficients_sum_to_one() {
        let sum = LUMA_R + LUMA_G + LUMA_B;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_luma_extremes() {
        assert_eq!(luma_u8(0, 0, 0), 0);
        assert_eq!(luma_u8(255, 255, 255), 255);
    }

    #[test]
    fn test_green_dominates() {
        assert!(luma_u8(0, 255, 0) > luma_u8(255, 0, 0));
        assert!(luma_u8(255, 0, 0) > luma_u8(0, 0, 255));
        assert_eq!(luma_u8(255, 0, 0), 76);
    }

    #[test]
    fn test_to_gray_len() {
        let img = RasterImage::filled(5, 4, [10, 10, 10]);
        let gray = to_gray(&img);
        assert_eq!(gray.len(), 20);
        assert!(gray.iter().all(|&v| v == 10));
    }
}
