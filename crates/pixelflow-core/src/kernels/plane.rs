//! Floating-point working buffers and separable convolution.

use crate::raster::RasterImage;

/// An interleaved `f32` buffer with 1 or 3 channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width * height * channels],
        }
    }

    /// Three-channel plane with values in 0-255.
    pub fn from_raster(image: &RasterImage) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            channels: 3,
            data: image.pixels().iter().map(|&v| v as f32).collect(),
        }
    }

    /// Single-channel plane from 8-bit values.
    pub fn from_gray(width: usize, height: usize, gray: &[u8]) -> Self {
        Self {
            width,
            height,
            channels: 1,
            data: gray.iter().map(|&v| v as f32).collect(),
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[(y * self.width + x) * self.channels + c]
    }

    /// Sample with edge replication.
    #[inline]
    pub fn at_clamped(&self, x: isize, y: isize, c: usize) -> f32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.at(cx, cy, c)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, value: f32) {
        self.data[(y * self.width + x) * self.channels + c] = value;
    }

    /// Round and clamp to 8 bits.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| v.round().clamp(0.0, 255.0) as u8)
            .collect()
    }
}

/// Normalized 1-D Gaussian weights of length `size` (made odd).
pub fn gaussian_weights(size: usize, sigma: f32) -> Vec<f32> {
    let size = if size % 2 == 0 { size + 1 } else { size };
    let half = (size / 2) as i32;
    let sigma2 = 2.0 * sigma * sigma;

    let mut weights: Vec<f32> = (-half..=half)
        .map(|x| (-((x * x) as f32) / sigma2).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Kernel size that covers about three standard deviations each side.
pub fn gaussian_size_for(sigma: f32) -> usize {
    let radius = (3.0 * sigma).ceil().max(1.0) as usize;
    2 * radius + 1
}

/// Apply the same 1-D kernel horizontally then vertically, replicating edges.
pub fn convolve_separable(src: &Plane, weights: &[f32]) -> Plane {
    let radius = (weights.len() / 2) as isize;
    let (w, h, ch) = (src.width, src.height, src.channels);

    let mut tmp = Plane::new(w, h, ch);
    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                let mut sum = 0.0;
                for (k, &kw) in weights.iter().enumerate() {
                    sum += src.at_clamped(x as isize + k as isize - radius, y as isize, c) * kw;
                }
                tmp.set(x, y, c, sum);
            }
        }
    }

    let mut dst = Plane::new(w, h, ch);
    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                let mut sum = 0.0;
                for (k, &kw) in weights.iter().enumerate() {
                    sum += tmp.at_clamped(x as isize, y as isize + k as isize - radius, c) * kw;
                }
                dst.set(x, y, c, sum);
            }
        }
    }
    dst
}

/// Apply a square 3x3 kernel to a single-channel plane, replicating edges.
pub fn convolve3(src: &Plane, kernel: &[f32; 9]) -> Plane {
    let mut dst = Plane::new(src.width, src.height, 1);
    for y in 0..src.height {
        for x in 0..src.width {
            let mut sum = 0.0;
            for ky in 0..3 {
                for kx in 0..3 {
                    let sx = x as isize + kx as isize - 1;
                    let sy = y as isize + ky as isize - 1;
                    sum += src.at_clamped(sx, sy, 0) * kernel[ky * 3 + kx];
                }
            }
            dst.set(x, y, 0, sum);
        }
    }
    dst
}

/// Gaussian blur of a plane.
pub fn gaussian_blur(src: &Plane, size: usize, sigma: f32) -> Plane {
    convolve_separable(src, &gaussian_weights(size, sigma))
}

/// Box (mean) filter of a plane.
pub fn box_blur(src: &Plane, size: usize) -> Plane {
    let size = if size % 2 == 0 { size + 1 } else { size };
    let weights = vec![1.0 / size as f32; size];
    convolve_separable(src, &weights)
}
