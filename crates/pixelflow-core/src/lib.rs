//! pixelflow core - image operation pipeline engine
//!
//! This crate decodes an image, runs an ordered list of named operations
//! over it and re-encodes the result. It also provides single-shot
//! transforms (compress, resize, crop, convert) over stored images.
//!
//! The moving parts, in request order:
//!
//! - [`codec`]: base64 / data URI / container bytes to [`RasterImage`] and back
//! - [`registry`]: the closed catalog of operation families and methods
//! - [`validate`]: sparse parameter maps checked against a method's schema
//! - [`operation`]: typed operations built from validated parameters
//! - [`kernels`]: the pixel work, behind [`ImageKernels`]
//! - [`pipeline`]: sequential execution with per-step failure isolation
//! - [`files`]: stored-image transforms over an [`ImageStore`]

pub mod codec;
pub mod error;
pub mod files;
pub mod kernels;
pub mod operation;
pub mod params;
pub mod pipeline;
pub mod raster;
pub mod registry;
pub mod validate;

pub use codec::{CodecLimits, DecodeError, EncodeError, EncodeOptions, OutputFormat};
pub use error::{ErrorKind, PipelineError, Result};
pub use files::{FileOperation, FileSettings, FileTransformResult, FileTransformService, FsStore, ImageStore, MemoryStore};
pub use kernels::{ImageKernels, KernelError, NativeKernels};
pub use operation::Operation;
pub use params::{ParamKind, ParamMap, ParamSpec, ParamValue, ValidatedParams};
pub use pipeline::{OperationStep, Pipeline, PipelineConfig, PipelineResult, Stage, StepReport};
pub use raster::{RasterError, RasterImage};
pub use registry::{Family, FamilySpec, Method};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_end_to_end() {
        let img = RasterImage::filled(4, 4, [200, 200, 200]);
        let encoded = codec::to_data_uri(&codec::encode(&img, OutputFormat::Png).unwrap(), OutputFormat::Png);

        let steps = [OperationStep::new("threshold", Some("binary")).with_param("threshold", 100.0)];
        let result = Pipeline::new(PipelineConfig::default()).run(&encoded, &steps);

        assert!(result.success);
        let out = codec::decode(result.image.as_deref().unwrap()).unwrap();
        assert!(out.pixels().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_catalog_names_resolve() {
        for spec in registry::families() {
            for method in spec.methods() {
                assert_eq!(registry::resolve(spec.name(), Some(method.name())).unwrap(), method);
            }
        }
    }
}
