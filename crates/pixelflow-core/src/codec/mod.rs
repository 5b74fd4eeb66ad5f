//! Codec boundary: encoded bytes ↔ [`RasterImage`](crate::RasterImage).
//!
//! Decoding accepts any container the `image` crate recognizes (PNG, JPEG,
//! GIF, BMP, TIFF, WebP) and always normalizes to 8-bit RGB: alpha is
//! dropped, gray and palette images are expanded. Encoding supports PNG
//! (lossless, used for pipeline output) and JPEG (quality + optional DPI).
//!
//! Text transport is base64, optionally wrapped in a data URI
//! (`data:image/png;base64,...`). The prefix is stripped when present and
//! its absence is not an error.
//!
//! # Examples
//!
//! ```ignore
//! use pixelflow_core::codec::{decode_base64, encode, OutputFormat};
//!
//! let image = decode_base64("data:image/png;base64,iVBORw0...")?;
//! let png = encode(&image, OutputFormat::Png)?;
//! ```

mod data_uri;
mod decode;
mod encode;

use thiserror::Error;

pub use data_uri::{strip_data_uri_prefix, to_base64, to_data_uri};
pub use decode::{decode, decode_base64, decode_base64_with, decode_with, sniff_format};
pub use encode::{encode, encode_with, EncodeOptions, OutputFormat};

/// Errors raised while turning external bytes into a raster.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No image payload was supplied.
    #[error("No image data provided")]
    Empty,

    /// The text payload is not valid base64.
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// The bytes are not a recognized image container.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The container was recognized but the payload is truncated or corrupt.
    #[error("Corrupted or incomplete image data: {0}")]
    CorruptedFile(String),

    /// The header declares more pixels than the configured limit.
    #[error("Image too large: {width}x{height} exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },
}

/// Errors raised while encoding a raster.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The requested container is not one the encoder can produce.
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The underlying encoder failed.
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Limits and switches applied while decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecLimits {
    /// Maximum `width * height` accepted before a full decode is attempted.
    pub max_pixels: u64,
    /// Rotate/flip according to the EXIF orientation tag when present.
    pub apply_exif_orientation: bool,
}

impl CodecLimits {
    /// Whether a `width x height` raster stays within `max_pixels`.
    pub fn allows(&self, width: u32, height: u32) -> bool {
        u64::from(width) * u64::from(height) <= self.max_pixels
    }
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_pixels: 40_000_000,
            apply_exif_orientation: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RasterImage;

    fn gradient(width: u32, height: u32) -> RasterImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width.max(1)) as u8);
                pixels.push(((y * 255) / height.max(1)) as u8);
                pixels.push(128);
            }
        }
        RasterImage::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let img = gradient(37, 21);
        let png = encode(&img, OutputFormat::Png).unwrap();
        let back = decode(&png).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_jpeg_round_trip_keeps_dimensions() {
        let img = gradient(64, 48);
        let jpeg = encode(&img, OutputFormat::Jpeg).unwrap();
        let back = decode(&jpeg).unwrap();
        assert_eq!(back.dimensions(), (64, 48));
        assert_eq!(back.channels(), 3);
    }

    #[test]
    fn test_data_uri_round_trip() {
        let img = gradient(8, 8);
        let png = encode(&img, OutputFormat::Png).unwrap();

        let wrapped = to_data_uri(&png, OutputFormat::Png);
        assert!(wrapped.starts_with("data:image/png;base64,"));
        assert_eq!(decode_base64(&wrapped).unwrap(), img);

        let bare = to_base64(&png);
        assert_eq!(decode_base64(&bare).unwrap(), img);
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::InvalidFormat.to_string(),
            "Invalid or unsupported image format"
        );
        let err = DecodeError::TooLarge {
            width: 10,
            height: 10,
            limit: 50,
        };
        assert_eq!(
            err.to_string(),
            "Image too large: 10x10 exceeds the 50 pixel limit"
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::RasterImage;
    use proptest::prelude::*;

    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=40, 1u32..=40)
    }

    proptest! {
        /// Property: decode(encode(image)) preserves dimensions and channel count.
        #[test]
        fn prop_round_trip_preserves_shape(
            (width, height) in dimensions_strategy(),
            seed in any::<u8>(),
            jpeg in any::<bool>(),
        ) {
            let pixels: Vec<u8> = (0..(width * height * 3) as usize)
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
                .collect();
            let img = RasterImage::new(width, height, pixels).unwrap();
            let format = if jpeg { OutputFormat::Jpeg } else { OutputFormat::Png };

            let bytes = encode(&img, format).unwrap();
            let back = decode(&bytes).unwrap();

            prop_assert_eq!(back.dimensions(), (width, height));
            prop_assert_eq!(back.byte_size(), img.byte_size());
        }
    }
}
