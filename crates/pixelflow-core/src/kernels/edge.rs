//! Edge detectors over the luma channel.
//!
//! Gradient operators (Sobel, Prewitt, Roberts) work on luma scaled to
//! `[0, 1]` and report `sqrt((gx² + gy²) / 2)` scaled back to 8 bits.
//! Laplace reports the absolute 4-neighbour Laplacian. Canny produces a
//! binary edge map.

use std::collections::VecDeque;

use super::luminance::to_gray;
use super::plane::{convolve3, gaussian_blur, gaussian_size_for, Plane};
use super::KernelError;
use crate::operation::EdgeOp;
use crate::raster::RasterImage;

const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];
const PREWITT_X: [f32; 9] = [-1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0];
const PREWITT_Y: [f32; 9] = [-1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
const LAPLACE: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

pub fn apply(image: &RasterImage, op: &EdgeOp) -> Result<RasterImage, KernelError> {
    let (w, h) = image.dimensions();
    let gray = Plane::from_gray(w as usize, h as usize, &to_gray(image));
    let out = match *op {
        EdgeOp::Canny { sigma, low, high } => canny(&gray, sigma as f32, low as f32, high as f32),
        EdgeOp::Sobel => gradient(&gray, &SOBEL_X, &SOBEL_Y, 4.0),
        EdgeOp::Prewitt => gradient(&gray, &PREWITT_X, &PREWITT_Y, 3.0),
        EdgeOp::Roberts => roberts(&gray),
        EdgeOp::Laplace => convolve3(&gray, &LAPLACE)
            .data
            .iter()
            .map(|v| v.abs().min(255.0) as u8)
            .collect(),
    };
    Ok(RasterImage::from_gray(w, h, &out)?)
}

fn gradient(gray: &Plane, kx: &[f32; 9], ky: &[f32; 9], norm: f32) -> Vec<u8> {
    let scale = 1.0 / (255.0 * norm);
    let gx = convolve3(gray, kx);
    let gy = convolve3(gray, ky);
    gx.data
        .iter()
        .zip(&gy.data)
        .map(|(&a, &b)| {
            let (a, b) = (a * scale, b * scale);
            let mag = ((a * a + b * b) / 2.0).sqrt();
            (mag * 255.0).clamp(0.0, 255.0) as u8
        })
        .collect()
}

fn roberts(gray: &Plane) -> Vec<u8> {
    let (w, h) = (gray.width, gray.height);
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let (xi, yi) = (x as isize, y as isize);
            let p = gray.at_clamped(xi, yi, 0) / 255.0;
            let pd = gray.at_clamped(xi + 1, yi + 1, 0) / 255.0;
            let pr = gray.at_clamped(xi + 1, yi, 0) / 255.0;
            let pb = gray.at_clamped(xi, yi + 1, 0) / 255.0;
            let pos = p - pd;
            let neg = pr - pb;
            let mag = ((pos * pos + neg * neg) / 2.0).sqrt();
            out.push((mag * 255.0).clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Canny edge detector: Gaussian smoothing, Sobel gradients,
/// non-maximum suppression and hysteresis between `low` and `high`.
fn canny(gray: &Plane, sigma: f32, low: f32, high: f32) -> Vec<u8> {
    let (w, h) = (gray.width, gray.height);
    let (low, high) = if low <= high { (low, high) } else { (high, low) };

    let smooth = gaussian_blur(gray, gaussian_size_for(sigma), sigma);
    let gx = convolve3(&smooth, &SOBEL_X);
    let gy = convolve3(&smooth, &SOBEL_Y);
    let mag: Vec<f32> = gx
        .data
        .iter()
        .zip(&gy.data)
        .map(|(a, b)| a.hypot(*b))
        .collect();

    let at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            mag[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut class = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let m = mag[i];
            if m < low {
                continue;
            }
            let angle = gy.data[i].atan2(gx.data[i]).to_degrees();
            let angle = if angle < 0.0 { angle + 180.0 } else { angle };
            let (dx, dy) = if !(22.5..157.5).contains(&angle) {
                (1, 0)
            } else if angle < 67.5 {
                (1, 1)
            } else if angle < 112.5 {
                (0, 1)
            } else {
                (-1, 1)
            };
            let (xi, yi) = (x as isize, y as isize);
            if m >= at(xi + dx, yi + dy) && m >= at(xi - dx, yi - dy) {
                class[i] = if m >= high { 2 } else { 1 };
            }
        }
    }

    let mut out = vec![0u8; w * h];
    let mut queue: VecDeque<usize> = (0..w * h).filter(|&i| class[i] == 2).collect();
    for &i in &queue {
        out[i] = 255;
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if class[j] == 1 && out[j] == 0 {
                    out[j] = 255;
                    queue.push_back(j);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::test_images;

    #[test]
    fn test_flat_image_has_no_edges() {
        let img = RasterImage::filled(16, 16, [120, 120, 120]);
        for op in [
            EdgeOp::Canny {
                sigma: 2.0,
                low: 100,
                high: 200,
            },
            EdgeOp::Sobel,
            EdgeOp::Laplace,
            EdgeOp::Prewitt,
            EdgeOp::Roberts,
        ] {
            let out = apply(&img, &op).unwrap();
            assert!(out.pixels().iter().all(|&v| v == 0), "{op:?} found edges");
        }
    }

    #[test]
    fn test_square_outline_detected() {
        let img = test_images::square(32, 12);
        for op in [EdgeOp::Sobel, EdgeOp::Prewitt, EdgeOp::Roberts, EdgeOp::Laplace] {
            let out = apply(&img, &op).unwrap();
            // Last background column before the square is x = 9.
            assert!(out.get(9, 16)[0] > 0, "{op:?} missed the edge");
            assert_eq!(out.get(16, 16)[0], 0, "{op:?} fired inside");
        }
    }

    #[test]
    fn test_canny_is_binary_and_finds_square() {
        let img = test_images::square(40, 16);
        let out = apply(
            &img,
            &EdgeOp::Canny {
                sigma: 1.0,
                low: 100,
                high: 200,
            },
        )
        .unwrap();
        assert!(out.pixels().iter().all(|&v| v == 0 || v == 255));
        assert!(out.pixels().iter().any(|&v| v == 255));
        assert_eq!(out.get(20, 20)[0], 0);
        assert_eq!(out.get(1, 1)[0], 0);
    }
}
