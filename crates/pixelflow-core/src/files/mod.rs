//! Single-shot transforms over stored images.
//!
//! Each operation reads one object from an [`ImageStore`], decodes it,
//! transforms it, encodes the result and writes it back under
//! `<operation>_<stem>.<ext>`. Nothing is written unless every earlier
//! stage succeeded.

mod store;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use store::{FsStore, ImageStore, MemoryStore};

use crate::codec::{self, CodecLimits, EncodeOptions, OutputFormat};
use crate::error::{PipelineError, Result};
use crate::kernels::geometric;
use crate::raster::RasterImage;

/// The four stored-image operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Compress,
    Resize,
    Crop,
    Convert,
}

impl FileOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Resize => "resize",
            Self::Crop => "crop",
            Self::Convert => "convert",
        }
    }

    /// Response field carrying the output size.
    pub fn size_field(self) -> &'static str {
        match self {
            Self::Compress => "compressed_size",
            Self::Resize => "resized_size",
            Self::Crop => "cropped_size",
            Self::Convert => "converted_size",
        }
    }
}

/// Service-wide settings for the file transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSettings {
    pub compress_quality: u8,
    pub resize_quality: u8,
    pub convert_quality: u8,
    pub codec: CodecLimits,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            compress_quality: 85,
            resize_quality: 90,
            convert_quality: 95,
            codec: CodecLimits::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompressRequest {
    pub key: String,
    #[serde(default)]
    pub quality: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    #[default]
    Dimensions,
    Percentage,
}

fn jpeg() -> OutputFormat {
    OutputFormat::Jpeg
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResizeRequest {
    pub key: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub mode: ResizeMode,
    #[serde(default = "jpeg")]
    pub format: OutputFormat,
    #[serde(default)]
    pub quality: Option<i64>,
    #[serde(default)]
    pub dpi: Option<u16>,
}

impl ResizeRequest {
    pub fn dimensions(key: impl Into<String>, width: i64, height: i64) -> Self {
        Self {
            key: key.into(),
            width: Some(width),
            height: Some(height),
            percentage: None,
            mode: ResizeMode::Dimensions,
            format: OutputFormat::Jpeg,
            quality: None,
            dpi: None,
        }
    }

    pub fn percentage(key: impl Into<String>, percentage: f64) -> Self {
        Self {
            percentage: Some(percentage),
            mode: ResizeMode::Percentage,
            width: None,
            height: None,
            ..Self::dimensions(key, 0, 0)
        }
    }
}

/// Pixel rectangle `[left, right) × [top, bottom)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CropRequest {
    pub key: String,
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConvertRequest {
    pub key: String,
}

/// Outcome of a successful file transform.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTransformResult {
    pub operation: FileOperation,
    /// Storage key the output was written under.
    pub key: String,
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub original_size_kb: f64,
    pub transformed_size_kb: f64,
}

/// Bytes to kilobytes, rounded to two decimals.
pub fn size_kb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

/// `<operation>_<stem>.<ext>`
pub fn output_key(operation: FileOperation, key: &str, format: OutputFormat) -> String {
    let stem = match key.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => key,
    };
    format!("{}_{stem}.{}", operation.as_str(), format.extension())
}

fn quality(name: &str, value: Option<i64>, default: u8) -> Result<u8> {
    match value {
        None => Ok(default),
        Some(q @ 1..=100) => Ok(q as u8),
        Some(q) => Err(PipelineError::invalid(name, format!("{q} is outside 1..=100"))),
    }
}

fn positive(name: &str, value: Option<i64>) -> Result<u32> {
    match value {
        Some(v) if v > 0 && v <= u32::MAX as i64 => Ok(v as u32),
        Some(v) => Err(PipelineError::invalid(name, format!("{v} must be positive"))),
        None => Err(PipelineError::invalid(name, "is required")),
    }
}

/// Largest side a JPEG header can describe.
const JPEG_MAX_SIDE: u32 = 65_535;

/// Reject resize targets that could not be allocated or encoded.
fn check_target(limits: &CodecLimits, width: u32, height: u32, format: OutputFormat) -> Result<()> {
    if !limits.allows(width, height) {
        return Err(PipelineError::invalid(
            "width",
            format!("{width}x{height} exceeds the {} pixel limit", limits.max_pixels),
        ));
    }
    if format == OutputFormat::Jpeg && width.max(height) > JPEG_MAX_SIDE {
        return Err(PipelineError::invalid(
            "width",
            format!("{width}x{height} is larger than JPEG allows"),
        ));
    }
    Ok(())
}

/// Runs file transforms against a store.
#[derive(Debug)]
pub struct FileTransformService<S> {
    store: S,
    settings: FileSettings,
}

impl<S: ImageStore> FileTransformService<S> {
    pub fn new(store: S, settings: FileSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &FileSettings {
        &self.settings
    }

    /// Re-encode as JPEG at `quality` (default from settings).
    pub fn compress(&self, req: &CompressRequest) -> Result<FileTransformResult> {
        let quality = quality("quality", req.quality, self.settings.compress_quality)?;
        let (source, original) = self.load(&req.key)?;
        let options = EncodeOptions { quality, dpi: None };
        self.commit(FileOperation::Compress, &req.key, &source, OutputFormat::Jpeg, &options, original)
    }

    /// Scale to explicit dimensions or by a percentage.
    pub fn resize(&self, req: &ResizeRequest) -> Result<FileTransformResult> {
        let quality = quality("quality", req.quality, self.settings.resize_quality)?;
        let (source, original) = self.load(&req.key)?;
        let (w, h) = source.dimensions();

        let (width, height) = match req.mode {
            ResizeMode::Dimensions => (positive("width", req.width)?, positive("height", req.height)?),
            ResizeMode::Percentage => {
                let pct = req
                    .percentage
                    .ok_or_else(|| PipelineError::invalid("percentage", "is required"))?;
                if !pct.is_finite() || pct <= 0.0 {
                    return Err(PipelineError::invalid("percentage", format!("{pct} must be positive")));
                }
                let scale = |v: u32| ((v as f64 * pct / 100.0).round() as u32).max(1);
                (scale(w), scale(h))
            }
        };

        check_target(&self.settings.codec, width, height, req.format)?;

        if req.dpi.is_some() && req.format == OutputFormat::Png {
            debug!(key = %req.key, "dpi ignored for png output");
        }
        let resized = geometric::resize(&source, width, height, FilterType::Lanczos3)
            .map_err(|e| PipelineError::invalid("width", e.to_string()))?;
        let options = EncodeOptions { quality, dpi: req.dpi };
        self.commit(FileOperation::Resize, &req.key, &resized, req.format, &options, original)
    }

    /// Cut a pixel rectangle, keeping PNG or JPEG containers.
    pub fn crop(&self, req: &CropRequest) -> Result<FileTransformResult> {
        let bytes = self.store.read(&req.key)?;
        let original = bytes.len() as u64;
        let format = codec::sniff_format(&bytes)
            .and_then(OutputFormat::from_image_format)
            .unwrap_or(OutputFormat::Png);
        let source = codec::decode_with(&bytes, &self.settings.codec)?;
        let (w, h) = source.dimensions();

        if req.right <= req.left {
            return Err(PipelineError::invalid("right", "must be greater than left"));
        }
        if req.bottom <= req.top {
            return Err(PipelineError::invalid("bottom", "must be greater than top"));
        }
        for (name, v, max) in [
            ("left", req.left, w),
            ("top", req.top, h),
            ("right", req.right, w),
            ("bottom", req.bottom, h),
        ] {
            if v < 0 || v > max as i64 {
                return Err(PipelineError::invalid(
                    name,
                    format!("{v} is outside the {w}x{h} image"),
                ));
            }
        }

        let cropped = geometric::crop(
            &source,
            req.left as u32,
            req.top as u32,
            req.right as u32,
            req.bottom as u32,
        )
        .map_err(|e| PipelineError::invalid("crop", e.to_string()))?;
        let options = EncodeOptions {
            quality: self.settings.convert_quality,
            dpi: None,
        };
        self.commit(FileOperation::Crop, &req.key, &cropped, format, &options, original)
    }

    /// Normalize to RGB and write a JPEG.
    pub fn convert_to_jpg(&self, req: &ConvertRequest) -> Result<FileTransformResult> {
        let (source, original) = self.load(&req.key)?;
        let options = EncodeOptions {
            quality: self.settings.convert_quality,
            dpi: None,
        };
        self.commit(FileOperation::Convert, &req.key, &source, OutputFormat::Jpeg, &options, original)
    }

    fn load(&self, key: &str) -> Result<(RasterImage, u64)> {
        let bytes = self.store.read(key)?;
        let image = codec::decode_with(&bytes, &self.settings.codec)?;
        Ok((image, bytes.len() as u64))
    }

    fn commit(
        &self,
        operation: FileOperation,
        key: &str,
        image: &RasterImage,
        format: OutputFormat,
        options: &EncodeOptions,
        original: u64,
    ) -> Result<FileTransformResult> {
        let bytes = codec::encode_with(image, format, options)?;
        let out_key = output_key(operation, key, format);
        self.store.write(&out_key, &bytes)?;

        info!(
            operation = operation.as_str(),
            source = key,
            output = %out_key,
            original_bytes = original,
            output_bytes = bytes.len(),
            "file transform complete"
        );
        Ok(FileTransformResult {
            operation,
            key: out_key,
            format,
            width: image.width(),
            height: image.height(),
            original_size_kb: size_kb(original),
            transformed_size_kb: size_kb(bytes.len() as u64),
            bytes,
        })
    }
}
