//! Artistic effects composed from the other kernels.
//!
//! `strength` scales the pixelate block size and the oil-painting
//! intensity quantization; the remaining effects have fixed settings.

use image::imageops::FilterType;

use super::filter::{bilateral, median_gray};
use super::geometric::resize;
use super::luminance::to_gray;
use super::plane::{gaussian_blur, Plane};
use super::threshold::adaptive_mean;
use super::KernelError;
use crate::operation::EffectOp;
use crate::raster::RasterImage;
use crate::registry::EffectMethod;

/// Neighbourhood width of the oil-painting filter.
const OIL_SIZE: i64 = 7;

pub fn apply(image: &RasterImage, op: &EffectOp) -> Result<RasterImage, KernelError> {
    match op.effect {
        EffectMethod::Cartoon => cartoon(image),
        EffectMethod::OilPainting => oil_painting(image, op.strength),
        EffectMethod::PencilSketch => Ok(pencil_sketch(image)),
        EffectMethod::Watercolor => watercolor(image),
        EffectMethod::Pixelate => pixelate(image, op.strength),
    }
}

/// Flattened colors masked by dark outlines.
fn cartoon(image: &RasterImage) -> Result<RasterImage, KernelError> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let gray = median_gray(&to_gray(image), w, h, 5);
    let edges = adaptive_mean(&gray, w, h, 9, 9.0);
    let color = bilateral(image, 9, 300.0, 300.0);

    let pixels = color
        .chunks_exact(3)
        .zip(&edges)
        .flat_map(|(px, &mask)| {
            if mask == 255 {
                [px[0], px[1], px[2]]
            } else {
                [0, 0, 0]
            }
        })
        .collect();
    Ok(RasterImage::new(image.width(), image.height(), pixels)?)
}

/// Each pixel takes the mean color of the most common intensity level in
/// its neighbourhood. Intensities are quantized by `10 * strength`.
fn oil_painting(image: &RasterImage, strength: f64) -> Result<RasterImage, KernelError> {
    let dyn_ratio = ((10.0 * strength) as u8).max(1);
    let levels = 256 / dyn_ratio as usize + 1;
    let gray = to_gray(image);
    let (w, h) = (image.width() as i64, image.height() as i64);
    let r = OIL_SIZE / 2;
    let src = image.pixels();

    let mut counts = vec![0u32; levels];
    let mut sums = vec![[0u32; 3]; levels];
    let mut out = Vec::with_capacity(src.len());

    for y in 0..h {
        for x in 0..w {
            counts.iter_mut().for_each(|c| *c = 0);
            sums.iter_mut().for_each(|s| *s = [0; 3]);
            for dy in -r..=r {
                let sy = (y + dy).clamp(0, h - 1);
                for dx in -r..=r {
                    let sx = (x + dx).clamp(0, w - 1);
                    let i = (sy * w + sx) as usize;
                    let level = (gray[i] / dyn_ratio) as usize;
                    counts[level] += 1;
                    for c in 0..3 {
                        sums[level][c] += src[i * 3 + c] as u32;
                    }
                }
            }
            let (best, &count) = counts
                .iter()
                .enumerate()
                .max_by_key(|&(_, c)| *c)
                .unwrap_or((0, &1));
            let count = count.max(1);
            for c in 0..3 {
                out.push((sums[best][c] / count) as u8);
            }
        }
    }
    Ok(RasterImage::new(image.width(), image.height(), out)?)
}

/// Color-dodge pencil sketch tinted with the source colors.
fn pencil_sketch(image: &RasterImage) -> RasterImage {
    const SHADE: f32 = 0.05;
    let (w, h) = (image.width() as usize, image.height() as usize);
    let gray = to_gray(image);
    let inverted: Vec<u8> = gray.iter().map(|&v| 255 - v).collect();
    let blurred = gaussian_blur(&Plane::from_gray(w, h, &inverted), 21, 6.0);

    let sketch: Vec<f32> = gray
        .iter()
        .zip(&blurred.data)
        .map(|(&g, &b)| {
            let denom = (255.0 - b).max(1.0);
            (g as f32 * 255.0 / denom).min(255.0)
        })
        .collect();

    let mut out = image.clone();
    for (px, &s) in out.pixels_mut().chunks_exact_mut(3).zip(&sketch) {
        for v in px.iter_mut() {
            let tint = SHADE * *v as f32 + (1.0 - SHADE) * 255.0;
            *v = (s * tint / 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Edge-preserving smoothing followed by a softening pass.
fn watercolor(image: &RasterImage) -> Result<RasterImage, KernelError> {
    let (w, h) = image.dimensions();
    let mut current = image.clone();
    for _ in 0..2 {
        current = RasterImage::new(w, h, bilateral(&current, 9, 0.6 * 255.0, 60.0 / 6.0))?;
    }
    Ok(RasterImage::new(w, h, bilateral(&current, 9, 75.0, 75.0))?)
}

/// Block size is `max(w, h) * 0.03 * strength`, at least 1.
pub fn pixel_size(width: u32, height: u32, strength: f64) -> u32 {
    ((width.max(height) as f64 * 0.03 * strength) as u32).max(1)
}

fn pixelate(image: &RasterImage, strength: f64) -> Result<RasterImage, KernelError> {
    let (w, h) = image.dimensions();
    let size = pixel_size(w, h, strength);
    if size == 1 {
        return Ok(image.clone());
    }
    let small = resize(image, (w / size).max(1), (h / size).max(1), FilterType::Triangle)?;
    resize(&small, w, h, FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::test_images;

    fn effect(effect: EffectMethod, strength: f64) -> EffectOp {
        EffectOp { effect, strength }
    }

    #[test]
    fn test_pixel_size() {
        assert_eq!(pixel_size(100, 50, 0.5), 1);
        assert_eq!(pixel_size(1000, 500, 1.0), 30);
        assert_eq!(pixel_size(10, 10, 0.1), 1);
    }

    #[test]
    fn test_pixelate_makes_blocks() {
        let img = test_images::gradient(200, 100);
        let out = apply(&img, &effect(EffectMethod::Pixelate, 1.0)).unwrap();
        assert_eq!(out.dimensions(), (200, 100));
        // 6 px blocks: neighbours inside one block match.
        assert_eq!(out.get(0, 0), out.get(1, 1));
        assert_eq!(out.get(6, 6), out.get(7, 7));
    }

    #[test]
    fn test_effects_keep_dimensions() {
        let img = test_images::gradient(20, 14);
        for method in EffectMethod::ALL {
            let out = apply(&img, &effect(*method, 0.5)).unwrap();
            assert_eq!(out.dimensions(), (20, 14), "{method}");
        }
    }

    #[test]
    fn test_oil_painting_flat_region() {
        let img = RasterImage::filled(10, 10, [40, 80, 120]);
        let out = apply(&img, &effect(EffectMethod::OilPainting, 1.0)).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_cartoon_keeps_flat_color() {
        // No edges on a flat image, so the mask is fully white.
        let img = RasterImage::filled(12, 12, [200, 100, 50]);
        let out = apply(&img, &effect(EffectMethod::Cartoon, 0.5)).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_pencil_sketch_white_stays_white() {
        let img = RasterImage::filled(8, 8, [255, 255, 255]);
        let out = apply(&img, &effect(EffectMethod::PencilSketch, 0.5)).unwrap();
        assert!(out.pixels().iter().all(|&v| v == 255));
    }
}
