//! Global and local binarization of the luma channel.

use tracing::debug;

use super::histogram::Histogram;
use super::luminance::to_gray;
use super::plane::{box_blur, gaussian_blur, Plane};
use super::KernelError;
use crate::operation::ThresholdOp;
use crate::raster::RasterImage;

pub fn apply(image: &RasterImage, op: &ThresholdOp) -> Result<RasterImage, KernelError> {
    let (w, h) = image.dimensions();
    let gray = to_gray(image);
    let mask = match *op {
        ThresholdOp::Binary { threshold } => binary(&gray, threshold),
        ThresholdOp::Adaptive { block_size, c } => {
            adaptive_gaussian(&gray, w as usize, h as usize, block_size as usize, c as f32)
        }
        ThresholdOp::Otsu => {
            let t = Histogram::from_values(&gray).otsu();
            debug!(threshold = t, "otsu threshold");
            binary(&gray, t)
        }
        ThresholdOp::Triangle => {
            let t = Histogram::from_values(&gray).triangle();
            debug!(threshold = t, "triangle threshold");
            binary(&gray, t)
        }
    };
    Ok(RasterImage::from_gray(w, h, &mask)?)
}

/// 255 where the value is strictly above `threshold`, else 0.
pub fn binary(gray: &[u8], threshold: u8) -> Vec<u8> {
    gray.iter()
        .map(|&v| if v > threshold { 255 } else { 0 })
        .collect()
}

/// Gaussian-weighted local threshold: 255 where `v > mean - c`.
pub fn adaptive_gaussian(gray: &[u8], width: usize, height: usize, block: usize, c: f32) -> Vec<u8> {
    let sigma = 0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let plane = Plane::from_gray(width, height, gray);
    let mean = gaussian_blur(&plane, block, sigma);
    compare(gray, &mean, c)
}

/// Box-mean local threshold: 255 where `v > mean - c`.
pub fn adaptive_mean(gray: &[u8], width: usize, height: usize, block: usize, c: f32) -> Vec<u8> {
    let plane = Plane::from_gray(width, height, gray);
    let mean = box_blur(&plane, block);
    compare(gray, &mean, c)
}

fn compare(gray: &[u8], mean: &Plane, c: f32) -> Vec<u8> {
    gray.iter()
        .zip(&mean.data)
        .map(|(&v, &m)| if v as f32 > m.round() - c { 255 } else { 0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::test_images;

    fn is_binary(img: &RasterImage) -> bool {
        img.pixels().iter().all(|&v| v == 0 || v == 255)
    }

    #[test]
    fn test_binary_threshold() {
        assert_eq!(binary(&[0, 127, 128, 255], 127), vec![0, 0, 255, 255]);
    }

    #[test]
    fn test_all_methods_produce_binary_output() {
        let img = test_images::gradient(32, 32);
        for op in [
            ThresholdOp::Binary { threshold: 127 },
            ThresholdOp::Adaptive { block_size: 11, c: 2 },
            ThresholdOp::Otsu,
            ThresholdOp::Triangle,
        ] {
            let out = apply(&img, &op).unwrap();
            assert_eq!(out.dimensions(), (32, 32));
            assert!(is_binary(&out), "{op:?} output not binary");
        }
    }

    #[test]
    fn test_otsu_separates_square() {
        let img = test_images::square(20, 8);
        let out = apply(&img, &ThresholdOp::Otsu).unwrap();
        assert_eq!(out.get(10, 10), [255, 255, 255]);
        assert_eq!(out.get(0, 0), [0, 0, 0]);
    }

    #[test]
    fn test_adaptive_flat_region_is_white() {
        // v > v - c holds on a constant image for positive c.
        let gray = vec![90u8; 64];
        let out = adaptive_gaussian(&gray, 8, 8, 5, 2.0);
        assert!(out.iter().all(|&v| v == 255));
        let out = adaptive_mean(&gray, 8, 8, 9, 9.0);
        assert!(out.iter().all(|&v| v == 255));
    }
}
