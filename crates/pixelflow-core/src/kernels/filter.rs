//! Noise reduction filters.
//!
//! All filters run per channel with edge replication.

use tracing::trace;

use super::plane::{gaussian_blur, Plane};
use super::KernelError;
use crate::operation::NoiseOp;
use crate::raster::RasterImage;

/// Range sigma used by the bilateral noise filter.
pub const BILATERAL_SIGMA: f32 = 75.0;

/// Filtering strength of non-local means.
const NLMEANS_H: f32 = 10.0;
/// Patch radius (3x3 patches).
const NLMEANS_PATCH: isize = 1;
/// Search window radius (11x11 window).
const NLMEANS_SEARCH: isize = 5;

/// Decomposition depth of the wavelet denoiser.
const WAVELET_LEVELS: usize = 3;

pub fn apply(image: &RasterImage, op: &NoiseOp) -> Result<RasterImage, KernelError> {
    let (w, h) = image.dimensions();
    let pixels = match *op {
        NoiseOp::Gaussian { kernel_size, sigma } => {
            gaussian_blur(&Plane::from_raster(image), kernel_size as usize, sigma as f32).to_bytes()
        }
        NoiseOp::Median { kernel_size } => median(image, kernel_size as usize),
        NoiseOp::Bilateral { kernel_size } => {
            bilateral(image, kernel_size as usize, BILATERAL_SIGMA, BILATERAL_SIGMA)
        }
        NoiseOp::NlMeans => nl_means(image),
        NoiseOp::Wavelet => wavelet(image),
    };
    Ok(RasterImage::new(w, h, pixels)?)
}

/// Median of each `size x size` neighbourhood.
pub fn median(image: &RasterImage, size: usize) -> Vec<u8> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let r = (size / 2) as i64;
    let src = image.pixels();
    let mut out = Vec::with_capacity(src.len());
    let mut window: Vec<u8> = Vec::with_capacity(size * size);

    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                window.clear();
                for dy in -r..=r {
                    let sy = (y + dy).clamp(0, h - 1);
                    for dx in -r..=r {
                        let sx = (x + dx).clamp(0, w - 1);
                        window.push(src[((sy * w + sx) * 3) as usize + c]);
                    }
                }
                let mid = window.len() / 2;
                let (_, m, _) = window.select_nth_unstable(mid);
                out.push(*m);
            }
        }
    }
    out
}

/// Median of a single-channel buffer.
pub fn median_gray(gray: &[u8], width: usize, height: usize, size: usize) -> Vec<u8> {
    let (w, h) = (width as i64, height as i64);
    let r = (size / 2) as i64;
    let mut out = Vec::with_capacity(gray.len());
    let mut window: Vec<u8> = Vec::with_capacity(size * size);
    for y in 0..h {
        for x in 0..w {
            window.clear();
            for dy in -r..=r {
                let sy = (y + dy).clamp(0, h - 1);
                for dx in -r..=r {
                    let sx = (x + dx).clamp(0, w - 1);
                    window.push(gray[(sy * w + sx) as usize]);
                }
            }
            let mid = window.len() / 2;
            let (_, m, _) = window.select_nth_unstable(mid);
            out.push(*m);
        }
    }
    out
}

/// Edge-preserving bilateral filter.
///
/// `diameter` is the neighbourhood width; range distance is the sum of
/// absolute channel differences.
pub fn bilateral(image: &RasterImage, diameter: usize, sigma_color: f32, sigma_space: f32) -> Vec<u8> {
    trace!(diameter, sigma_color, sigma_space, "bilateral");
    let (w, h) = (image.width() as i64, image.height() as i64);
    let r = (diameter / 2).max(1) as i64;
    let src = image.pixels();

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let color_lut: Vec<f32> = (0..=255 * 3)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = (dx * dx + dy * dy) as f32;
            if d2 <= (r * r) as f32 {
                offsets.push((dx, dy, (d2 * space_coeff).exp()));
            }
        }
    }

    let mut out = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let ci = ((y * w + x) * 3) as usize;
            let center = [src[ci] as i32, src[ci + 1] as i32, src[ci + 2] as i32];
            let mut sum = [0f32; 3];
            let mut wsum = 0f32;
            for &(dx, dy, ws) in &offsets {
                let sx = (x + dx).clamp(0, w - 1);
                let sy = (y + dy).clamp(0, h - 1);
                let si = ((sy * w + sx) * 3) as usize;
                let px = [src[si] as i32, src[si + 1] as i32, src[si + 2] as i32];
                let diff = (px[0] - center[0]).abs()
                    + (px[1] - center[1]).abs()
                    + (px[2] - center[2]).abs();
                let weight = ws * color_lut[diff as usize];
                for c in 0..3 {
                    sum[c] += px[c] as f32 * weight;
                }
                wsum += weight;
            }
            for c in 0..3 {
                out.push((sum[c] / wsum).round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    out
}

/// Non-local means: each pixel is the weighted mean of pixels in a search
/// window, weighted by the similarity of their surrounding patches.
pub fn nl_means(image: &RasterImage) -> Vec<u8> {
    let src = Plane::from_raster(image);
    let (w, h) = (src.width as isize, src.height as isize);
    let patch_len = ((2 * NLMEANS_PATCH + 1).pow(2) * 3) as f32;
    let h2 = NLMEANS_H * NLMEANS_H;

    let mut out = Plane::new(src.width, src.height, 3);
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0f32; 3];
            let mut wsum = 0f32;
            for sy in (y - NLMEANS_SEARCH).max(0)..=(y + NLMEANS_SEARCH).min(h - 1) {
                for sx in (x - NLMEANS_SEARCH).max(0)..=(x + NLMEANS_SEARCH).min(w - 1) {
                    let mut dist = 0f32;
                    for py in -NLMEANS_PATCH..=NLMEANS_PATCH {
                        for px in -NLMEANS_PATCH..=NLMEANS_PATCH {
                            for c in 0..3 {
                                let a = src.at_clamped(x + px, y + py, c);
                                let b = src.at_clamped(sx + px, sy + py, c);
                                dist += (a - b) * (a - b);
                            }
                        }
                    }
                    let weight = (-(dist / patch_len) / h2).exp();
                    for c in 0..3 {
                        sum[c] += src.at(sx as usize, sy as usize, c) * weight;
                    }
                    wsum += weight;
                }
            }
            for c in 0..3 {
                out.set(x as usize, y as usize, c, sum[c] / wsum);
            }
        }
    }
    out.to_bytes()
}

/// Wavelet shrinkage with BayesShrink soft thresholds, applied to each
/// channel in YCbCr.
pub fn wavelet(image: &RasterImage) -> Vec<u8> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut ycc = Plane::from_raster(image);
    for px in ycc.data.chunks_exact_mut(3) {
        let (r, g, b) = (px[0], px[1], px[2]);
        px[0] = 0.299 * r + 0.587 * g + 0.114 * b;
        px[1] = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        px[2] = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    }

    // Pad to a multiple of 2^levels, limited by the smaller side.
    let mut levels = WAVELET_LEVELS;
    while levels > 0 && (w.min(h) >> levels) == 0 {
        levels -= 1;
    }
    let step = 1usize << levels;
    let pw = w.div_ceil(step) * step;
    let ph = h.div_ceil(step) * step;

    for c in 0..3 {
        let mut band = vec![0f32; pw * ph];
        for y in 0..ph {
            for x in 0..pw {
                band[y * pw + x] = ycc.at(x.min(w - 1), y.min(h - 1), c);
            }
        }
        shrink_channel(&mut band, pw, ph, levels);
        for y in 0..h {
            for x in 0..w {
                ycc.set(x, y, c, band[y * pw + x]);
            }
        }
    }

    for px in ycc.data.chunks_exact_mut(3) {
        let (y, cb, cr) = (px[0], px[1] - 128.0, px[2] - 128.0);
        px[0] = y + 1.402 * cr;
        px[1] = y - 0.344_136 * cb - 0.714_136 * cr;
        px[2] = y + 1.772 * cb;
    }
    ycc.to_bytes()
}

fn shrink_channel(band: &mut [f32], width: usize, height: usize, levels: usize) {
    if levels == 0 {
        return;
    }
    let (mut w, mut h) = (width, height);
    for _ in 0..levels {
        haar_forward(band, width, w, h);
        w /= 2;
        h /= 2;
    }

    // Noise estimate from the finest diagonal detail band.
    let (fw, fh) = (width / 2, height / 2);
    let mut diag: Vec<f32> = (0..fh)
        .flat_map(|y| (0..fw).map(move |x| (y, x)))
        .map(|(y, x)| band[(y + fh) * width + x + fw].abs())
        .collect();
    let sigma = median_f32(&mut diag) / 0.6745;

    let (mut w, mut h) = (width, height);
    for _ in 0..levels {
        let (hw, hh) = (w / 2, h / 2);
        for (x0, y0) in [(hw, 0), (0, hh), (hw, hh)] {
            let mut sq = 0f32;
            for y in y0..y0 + hh {
                for x in x0..x0 + hw {
                    sq += band[y * width + x].powi(2);
                }
            }
            let var = sq / (hw * hh) as f32;
            let signal = (var - sigma * sigma).max(0.0).sqrt();
            let threshold = if signal > 0.0 {
                sigma * sigma / signal
            } else {
                f32::MAX
            };
            for y in y0..y0 + hh {
                for x in x0..x0 + hw {
                    let v = &mut band[y * width + x];
                    *v = v.signum() * (v.abs() - threshold).max(0.0);
                }
            }
        }
        w = hw;
        h = hh;
    }

    for level in (0..levels).rev() {
        haar_inverse(band, width, width >> level, height >> level);
    }
}

/// One 2-D Haar analysis step over the top-left `w x h` region.
fn haar_forward(band: &mut [f32], stride: usize, w: usize, h: usize) {
    let mut tmp = vec![0f32; w.max(h)];
    let s = std::f32::consts::FRAC_1_SQRT_2;
    for y in 0..h {
        for x in 0..w / 2 {
            let a = band[y * stride + 2 * x];
            let b = band[y * stride + 2 * x + 1];
            tmp[x] = (a + b) * s;
            tmp[x + w / 2] = (a - b) * s;
        }
        band[y * stride..y * stride + w].copy_from_slice(&tmp[..w]);
    }
    for x in 0..w {
        for y in 0..h / 2 {
            let a = band[2 * y * stride + x];
            let b = band[(2 * y + 1) * stride + x];
            tmp[y] = (a + b) * s;
            tmp[y + h / 2] = (a - b) * s;
        }
        for y in 0..h {
            band[y * stride + x] = tmp[y];
        }
    }
}

fn haar_inverse(band: &mut [f32], stride: usize, w: usize, h: usize) {
    let mut tmp = vec![0f32; w.max(h)];
    let s = std::f32::consts::FRAC_1_SQRT_2;
    for x in 0..w {
        for y in 0..h / 2 {
            let a = band[y * stride + x];
            let d = band[(y + h / 2) * stride + x];
            tmp[2 * y] = (a + d) * s;
            tmp[2 * y + 1] = (a - d) * s;
        }
        for y in 0..h {
            band[y * stride + x] = tmp[y];
        }
    }
    for y in 0..h {
        for x in 0..w / 2 {
            let a = band[y * stride + x];
            let d = band[y * stride + x + w / 2];
            tmp[2 * x] = (a + d) * s;
            tmp[2 * x + 1] = (a - d) * s;
        }
        band[y * stride..y * stride + w].copy_from_slice(&tmp[..w]);
    }
}

fn median_f32(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    *m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::test_images;

    fn variance(pixels: &[u8]) -> f64 {
        let n = pixels.len() as f64;
        let mean = pixels.iter().map(|&v| v as f64).sum::<f64>() / n;
        pixels.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n
    }

    #[test]
    fn test_constant_image_unchanged() {
        let img = RasterImage::filled(12, 10, [50, 100, 150]);
        for op in [
            NoiseOp::Gaussian {
                kernel_size: 5,
                sigma: 1.5,
            },
            NoiseOp::Median { kernel_size: 3 },
            NoiseOp::Bilateral { kernel_size: 5 },
            NoiseOp::NlMeans,
        ] {
            let out = apply(&img, &op).unwrap();
            assert_eq!(out, img, "{op:?} changed a flat image");
        }
    }

    #[test]
    fn test_wavelet_near_identity_on_flat_image() {
        let img = RasterImage::filled(13, 9, [50, 100, 150]);
        let out = apply(&img, &NoiseOp::Wavelet).unwrap();
        assert_eq!(out.dimensions(), (13, 9));
        for (a, b) in out.pixels().iter().zip(img.pixels()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_filters_reduce_noise() {
        // Mild noise around mid gray.
        let base = test_images::noise(24, 24, 7);
        let img = base.map_pixels(|px| px.map(|v| 120 + v % 16));
        let before = variance(img.pixels());
        for op in [
            NoiseOp::Gaussian {
                kernel_size: 5,
                sigma: 1.5,
            },
            NoiseOp::Median { kernel_size: 5 },
            NoiseOp::Bilateral { kernel_size: 9 },
            NoiseOp::NlMeans,
            NoiseOp::Wavelet,
        ] {
            let out = apply(&img, &op).unwrap();
            let after = variance(out.pixels());
            assert!(after < before, "{op:?}: {after} >= {before}");
        }
    }

    #[test]
    fn test_median_removes_salt() {
        let mut img = RasterImage::filled(7, 7, [10, 10, 10]);
        img.put(3, 3, [255, 255, 255]);
        let out = apply(&img, &NoiseOp::Median { kernel_size: 3 }).unwrap();
        assert_eq!(out.get(3, 3), [10, 10, 10]);
    }

    #[test]
    fn test_haar_round_trip() {
        let mut band: Vec<f32> = (0..64).map(|v| v as f32).collect();
        let original = band.clone();
        haar_forward(&mut band, 8, 8, 8);
        haar_inverse(&mut band, 8, 8, 8);
        for (a, b) in band.iter().zip(&original) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
