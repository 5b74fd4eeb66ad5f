//! Decoding with RGB normalization and optional EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::debug;

use super::data_uri::{decode_payload, strip_data_uri_prefix};
use super::{CodecLimits, DecodeError};
use crate::RasterImage;

/// Decode image bytes into an RGB raster using the default limits.
///
/// # Errors
///
/// Returns `DecodeError::Empty` for an empty slice,
/// `DecodeError::InvalidFormat` if the container is not recognized and
/// `DecodeError::CorruptedFile` if the payload is truncated or corrupt.
pub fn decode(bytes: &[u8]) -> Result<RasterImage, DecodeError> {
    decode_with(bytes, &CodecLimits::default())
}

/// Decode image bytes into an RGB raster under explicit limits.
pub fn decode_with(bytes: &[u8], limits: &CodecLimits) -> Result<RasterImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let format = sniff_format(bytes).ok_or(DecodeError::InvalidFormat)?;

    // Check declared dimensions before paying for a full decode.
    let (width, height) = open(bytes)?
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    let pixels = width as u64 * height as u64;
    if pixels > limits.max_pixels {
        return Err(DecodeError::TooLarge {
            width,
            height,
            limit: limits.max_pixels,
        });
    }

    let img = open(bytes)?
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let img = if limits.apply_exif_orientation {
        apply_orientation(img, extract_orientation(bytes))
    } else {
        img
    };

    debug!(?format, width, height, color = ?img.color(), "decoded image");

    Ok(RasterImage::from_rgb_image(img.into_rgb8()))
}

/// Decode base64 text (optionally a data URI) into an RGB raster.
pub fn decode_base64(text: &str) -> Result<RasterImage, DecodeError> {
    decode_base64_with(text, &CodecLimits::default())
}

/// Decode base64 text (optionally a data URI) under explicit limits.
pub fn decode_base64_with(text: &str, limits: &CodecLimits) -> Result<RasterImage, DecodeError> {
    let payload = strip_data_uri_prefix(text);
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    let bytes = decode_payload(payload).map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    decode_with(&bytes, limits)
}

/// Guess the container format from magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

fn open(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
}

/// Read the EXIF orientation tag (1-8). Missing or unreadable EXIF yields 1.
fn extract_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

/// Apply an EXIF orientation value to an image.
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
