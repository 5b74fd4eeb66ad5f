//! Pixel kernels behind the [`ImageKernels`] capability.
//!
//! The pipeline only ever calls [`ImageKernels::apply`]; [`NativeKernels`]
//! is the implementation shipped with the crate and works directly over
//! the interleaved RGB buffer. Single-channel results (thresholds, edges)
//! are replicated into all three channels.

pub mod color;
pub mod edge;
pub mod effects;
pub mod filter;
pub mod geometric;
pub mod histogram;
pub mod luminance;
pub mod morphology;
pub mod plane;
pub mod threshold;

use thiserror::Error;

use crate::operation::Operation;
use crate::raster::{RasterError, RasterImage};

/// Errors raised by a kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The transform matrix cannot be inverted.
    #[error("transform matrix is singular")]
    SingularMatrix,

    /// The kernel cannot run on this input.
    #[error("{0}")]
    Unsupported(String),

    /// The kernel produced a buffer that does not match its dimensions.
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Applies a typed [`Operation`] to a raster.
pub trait ImageKernels: Send + Sync {
    /// Return a new raster; the input is left untouched.
    fn apply(&self, image: &RasterImage, op: &Operation) -> Result<RasterImage, KernelError>;
}

/// Kernels implemented in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKernels;

impl ImageKernels for NativeKernels {
    fn apply(&self, image: &RasterImage, op: &Operation) -> Result<RasterImage, KernelError> {
        if image.is_empty() {
            return Err(KernelError::Unsupported("image has no pixels".into()));
        }
        match op {
            Operation::Threshold(op) => threshold::apply(image, op),
            Operation::Edge(op) => edge::apply(image, op),
            Operation::Noise(op) => filter::apply(image, op),
            Operation::Morph(op) => morphology::apply(image, op),
            Operation::Color(op) => color::apply(image, op),
            Operation::Effect(op) => effects::apply(image, op),
            Operation::Geometric(op) => geometric::apply(image, op),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_images {
    use crate::raster::RasterImage;

    /// Diagonal gradient with distinct channels.
    pub fn gradient(width: u32, height: u32) -> RasterImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width.max(2).saturating_sub(1)).min(255) as u8);
                pixels.push(((y * 255) / height.max(2).saturating_sub(1)).min(255) as u8);
                pixels.push((((x + y) * 8) % 256) as u8);
            }
        }
        RasterImage::new(width, height, pixels).unwrap()
    }

    /// Black background with a white square in the middle.
    pub fn square(size: u32, inner: u32) -> RasterImage {
        let mut img = RasterImage::filled(size, size, [0, 0, 0]);
        let start = (size - inner) / 2;
        for y in start..start + inner {
            for x in start..start + inner {
                img.put(x, y, [255, 255, 255]);
            }
        }
        img
    }

    /// Deterministic pseudo-random noise.
    pub fn noise(width: u32, height: u32, seed: u32) -> RasterImage {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        let pixels = (0..width * height * 3)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();
        RasterImage::new(width, height, pixels).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamMap;
    use crate::registry::families;
    use crate::validate::validate;

    #[test]
    fn test_every_default_operation_runs() {
        let img = test_images::gradient(24, 18);
        for family in families() {
            for method in family.methods() {
                if method.params().iter().any(|p| p.is_required()) {
                    continue;
                }
                let params = validate(method, &ParamMap::new()).unwrap();
                let op = Operation::build(method, &params).unwrap();
                let out = NativeKernels
                    .apply(&img, &op)
                    .unwrap_or_else(|e| panic!("{method} failed: {e}"));
                assert!(!out.is_empty(), "{method} produced an empty raster");
                assert_eq!(out.byte_size(), out.pixel_count() * 3);
            }
        }
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = RasterImage::new(0, 0, vec![]).unwrap();
        let op = Operation::Color(crate::operation::ColorOp::Equalize);
        assert!(NativeKernels.apply(&img, &op).is_err());
    }
}
