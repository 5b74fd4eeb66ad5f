//! Typed operations with fully validated payloads.
//!
//! An [`Operation`] can only be built from a resolved [`Method`] and its
//! [`ValidatedParams`], so kernels never see out-of-range values.

use crate::error::{PipelineError, Result};
use crate::kernels::geometric::rotated_bounds;
use crate::params::ValidatedParams;
use crate::registry::{
    ColorMethod, EdgeMethod, EffectMethod, GeometricMethod, Method, MorphMethod, NoiseMethod,
    ThresholdMethod,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdOp {
    Binary { threshold: u8 },
    Adaptive { block_size: u32, c: i32 },
    Otsu,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeOp {
    Canny { sigma: f64, low: u8, high: u8 },
    Sobel,
    Laplace,
    Prewitt,
    Roberts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseOp {
    Gaussian { kernel_size: u32, sigma: f64 },
    Median { kernel_size: u32 },
    Bilateral { kernel_size: u32 },
    NlMeans,
    Wavelet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphOp {
    pub method: MorphMethod,
    pub kernel_size: u32,
    /// Repeat count; always 1 for the compound operations.
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorOp {
    RgbToHsv,
    RgbToLab,
    Gamma { gamma: f64 },
    Equalize,
    AutoContrast,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectOp {
    pub effect: EffectMethod,
    /// Effect intensity in `[0.1, 1.0]`.
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometricOp {
    Resize { width: u32, height: u32 },
    /// Degrees, positive is counter-clockwise. The canvas grows to fit.
    Rotate { angle: f64 },
    /// Row-major 2x3 matrix mapping source to destination coordinates.
    Affine { matrix: [f64; 6] },
    /// Row-major 3x3 homography mapping source to destination coordinates.
    Perspective { matrix: [f64; 9] },
}

/// One executable pipeline step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Threshold(ThresholdOp),
    Edge(EdgeOp),
    Noise(NoiseOp),
    Morph(MorphOp),
    Color(ColorOp),
    Effect(EffectOp),
    Geometric(GeometricOp),
}

impl Operation {
    /// Build the typed operation for `method` from validated parameters.
    pub fn build(method: Method, params: &ValidatedParams) -> Result<Self> {
        let op = match method {
            Method::Threshold(m) => Self::Threshold(match m {
                ThresholdMethod::Binary => ThresholdOp::Binary {
                    threshold: params.int("threshold")? as u8,
                },
                ThresholdMethod::Adaptive => ThresholdOp::Adaptive {
                    block_size: params.size("block_size")?,
                    c: params.int("c")? as i32,
                },
                ThresholdMethod::Otsu => ThresholdOp::Otsu,
                ThresholdMethod::Triangle => ThresholdOp::Triangle,
            }),
            Method::Edge(m) => Self::Edge(match m {
                EdgeMethod::Canny => EdgeOp::Canny {
                    sigma: params.float("sigma")?,
                    low: params.int("low_threshold")? as u8,
                    high: params.int("high_threshold")? as u8,
                },
                EdgeMethod::Sobel => EdgeOp::Sobel,
                EdgeMethod::Laplace => EdgeOp::Laplace,
                EdgeMethod::Prewitt => EdgeOp::Prewitt,
                EdgeMethod::Roberts => EdgeOp::Roberts,
            }),
            Method::Noise(m) => Self::Noise(match m {
                NoiseMethod::Gaussian => NoiseOp::Gaussian {
                    kernel_size: params.size("kernel_size")?,
                    sigma: params.float("sigma")?,
                },
                NoiseMethod::Median => NoiseOp::Median {
                    kernel_size: params.size("kernel_size")?,
                },
                NoiseMethod::Bilateral => NoiseOp::Bilateral {
                    kernel_size: params.size("kernel_size")?,
                },
                NoiseMethod::NlMeans => NoiseOp::NlMeans,
                NoiseMethod::Wavelet => NoiseOp::Wavelet,
            }),
            Method::Morph(m) => {
                let iterations = match m {
                    MorphMethod::Dilate | MorphMethod::Erode => params.size("iterations")?,
                    _ => 1,
                };
                Self::Morph(MorphOp {
                    method: m,
                    kernel_size: params.size("kernel_size")?,
                    iterations,
                })
            }
            Method::Color(m) => Self::Color(match m {
                ColorMethod::RgbToHsv => ColorOp::RgbToHsv,
                ColorMethod::RgbToLab => ColorOp::RgbToLab,
                ColorMethod::Gamma => ColorOp::Gamma {
                    gamma: params.float("gamma")?,
                },
                ColorMethod::Equalize => ColorOp::Equalize,
                ColorMethod::AutoContrast => ColorOp::AutoContrast,
            }),
            Method::Effect(effect) => Self::Effect(EffectOp {
                effect,
                strength: params.float("strength")?,
            }),
            Method::Geometric(m) => Self::Geometric(match m {
                GeometricMethod::Resize => GeometricOp::Resize {
                    width: params.size("width")?,
                    height: params.size("height")?,
                },
                GeometricMethod::Rotate => GeometricOp::Rotate {
                    angle: params.float("angle")?,
                },
                GeometricMethod::Affine => GeometricOp::Affine {
                    matrix: fixed(params.matrix("matrix")?)?,
                },
                GeometricMethod::Perspective => GeometricOp::Perspective {
                    matrix: fixed(params.matrix("matrix")?)?,
                },
            }),
        };
        Ok(op)
    }

    /// Size of the raster this operation produces from a `width x height` input.
    pub fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            Self::Geometric(GeometricOp::Resize { width: w, height: h }) => (w, h),
            Self::Geometric(GeometricOp::Rotate { angle }) => rotated_bounds(width, height, angle),
            _ => (width, height),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Threshold(op) => Method::Threshold(match op {
                ThresholdOp::Binary { .. } => ThresholdMethod::Binary,
                ThresholdOp::Adaptive { .. } => ThresholdMethod::Adaptive,
                ThresholdOp::Otsu => ThresholdMethod::Otsu,
                ThresholdOp::Triangle => ThresholdMethod::Triangle,
            }),
            Self::Edge(op) => Method::Edge(match op {
                EdgeOp::Canny { .. } => EdgeMethod::Canny,
                EdgeOp::Sobel => EdgeMethod::Sobel,
                EdgeOp::Laplace => EdgeMethod::Laplace,
                EdgeOp::Prewitt => EdgeMethod::Prewitt,
                EdgeOp::Roberts => EdgeMethod::Roberts,
            }),
            Self::Noise(op) => Method::Noise(match op {
                NoiseOp::Gaussian { .. } => NoiseMethod::Gaussian,
                NoiseOp::Median { .. } => NoiseMethod::Median,
                NoiseOp::Bilateral { .. } => NoiseMethod::Bilateral,
                NoiseOp::NlMeans => NoiseMethod::NlMeans,
                NoiseOp::Wavelet => NoiseMethod::Wavelet,
            }),
            Self::Morph(op) => Method::Morph(op.method),
            Self::Color(op) => Method::Color(match op {
                ColorOp::RgbToHsv => ColorMethod::RgbToHsv,
                ColorOp::RgbToLab => ColorMethod::RgbToLab,
                ColorOp::Gamma { .. } => ColorMethod::Gamma,
                ColorOp::Equalize => ColorMethod::Equalize,
                ColorOp::AutoContrast => ColorMethod::AutoContrast,
            }),
            Self::Effect(op) => Method::Effect(op.effect),
            Self::Geometric(op) => Method::Geometric(match op {
                GeometricOp::Resize { .. } => GeometricMethod::Resize,
                GeometricOp::Rotate { .. } => GeometricMethod::Rotate,
                GeometricOp::Affine { .. } => GeometricMethod::Affine,
                GeometricOp::Perspective { .. } => GeometricMethod::Perspective,
            }),
        }
    }
}

fn fixed<const N: usize>(values: &[f64]) -> Result<[f64; N]> {
    values
        .try_into()
        .map_err(|_| PipelineError::invalid("matrix", format!("expected {N} values")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamMap, ParamValue};
    use crate::registry::{families, resolve};
    use crate::validate::validate;

    fn build(family: &str, method: &str, params: &[(&str, ParamValue)]) -> Result<Operation> {
        let method = resolve(family, Some(method))?;
        let map: ParamMap = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Operation::build(method, &validate(method, &map)?)
    }

    #[test]
    fn test_build_threshold_defaults() {
        let op = build("threshold", "binary", &[]).unwrap();
        assert_eq!(op, Operation::Threshold(ThresholdOp::Binary { threshold: 127 }));
        let op = build("threshold", "adaptive", &[("block_size", ParamValue::Number(8.0))]).unwrap();
        assert_eq!(
            op,
            Operation::Threshold(ThresholdOp::Adaptive { block_size: 9, c: 2 })
        );
    }

    #[test]
    fn test_morph_iterations_only_for_dilate_erode() {
        let iters = [("iterations", ParamValue::Number(4.0))];
        let Operation::Morph(dilate) = build("morphological", "dilate", &iters).unwrap() else {
            panic!("expected morph");
        };
        assert_eq!(dilate.iterations, 4);
        let Operation::Morph(opening) = build("morphological", "opening", &iters).unwrap() else {
            panic!("expected morph");
        };
        assert_eq!(opening.iterations, 1);
    }

    #[test]
    fn test_build_affine_matrix() {
        let rows = ParamValue::Rows(vec![vec![1.0, 0.0, 3.0], vec![0.0, 1.0, 4.0]]);
        let op = build("geometric", "affine", &[("matrix", rows)]).unwrap();
        assert_eq!(
            op,
            Operation::Geometric(GeometricOp::Affine {
                matrix: [1.0, 0.0, 3.0, 0.0, 1.0, 4.0]
            })
        );
    }

    #[test]
    fn test_method_round_trip_for_defaults() {
        // Every method with all-default params builds and reports itself back.
        for family in families() {
            for method in family.methods() {
                if method.params().iter().any(|p| p.is_required()) {
                    continue;
                }
                let params = validate(method, &ParamMap::new()).unwrap();
                let op = Operation::build(method, &params).unwrap();
                assert_eq!(op.method(), method);
            }
        }
    }
}
