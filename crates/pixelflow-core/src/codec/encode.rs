//! PNG and JPEG encoding.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};

use super::EncodeError;
use crate::RasterImage;

/// Containers the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless; the fixed pipeline output.
    #[default]
    Png,
    /// Lossy, quality 1-100.
    #[serde(alias = "jpg")]
    Jpeg,
}

impl OutputFormat {
    /// Parse a format name (`png`, `jpeg`, `jpg`, case-insensitive).
    pub fn parse(name: &str) -> Result<Self, EncodeError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(EncodeError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Map a sniffed container to an encodable format, if there is one.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Encoder settings. PNG ignores both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// JPEG quality (clamped to 1-100).
    pub quality: u8,
    /// JFIF pixel density in dots per inch.
    pub dpi: Option<u16>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 90,
            dpi: None,
        }
    }
}

/// Encode a raster with default options.
pub fn encode(image: &RasterImage, format: OutputFormat) -> Result<Vec<u8>, EncodeError> {
    encode_with(image, format, &EncodeOptions::default())
}

/// Encode a raster into `format`.
///
/// # Errors
///
/// Returns `EncodeError::InvalidDimensions` for a zero-sized raster and
/// `EncodeError::EncodingFailed` if the underlying encoder fails.
pub fn encode_with(
    image: &RasterImage,
    format: OutputFormat,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let mut buffer = Cursor::new(Vec::new());

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(image.pixels(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
        }
        OutputFormat::Jpeg => {
            let quality = options.quality.clamp(1, 100);
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            if let Some(dpi) = options.dpi {
                encoder.set_pixel_density(PixelDensity::dpi(dpi));
            }
            encoder
                .write_image(image.pixels(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
        }
    }

    Ok(buffer.into_inner())
}
