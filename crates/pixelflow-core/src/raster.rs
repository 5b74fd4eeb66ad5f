//! The in-memory raster every pipeline stage operates on.

use thiserror::Error;

/// Number of interleaved channels in a [`RasterImage`] (always RGB).
pub const CHANNELS: usize = 3;

/// Bit depth of each channel.
pub const BIT_DEPTH: u8 = 8;

/// Raised when a pixel buffer does not match its declared dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("raster buffer mismatch: {width}x{height} needs {expected} bytes, got {actual}")]
pub struct RasterError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

/// A decoded image with 8-bit RGB pixel data.
///
/// The buffer is row-major, 3 bytes per pixel, and its length is always
/// `width * height * 3`. Construction goes through [`RasterImage::new`] so
/// the invariant cannot be broken from outside the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Create a raster from dimensions and an RGB buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        let expected = expected_len(width, height);
        if pixels.len() != expected {
            return Err(RasterError {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a raster filled with a single color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(expected_len(width, height))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a raster from an `image::RgbImage`.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Build an RGB raster by replicating a single-channel (gray) buffer.
    pub fn from_gray(width: u32, height: u32, gray: &[u8]) -> Result<Self, RasterError> {
        let pixels: Vec<u8> = gray.iter().flat_map(|&v| [v, v, v]).collect();
        Self::new(width, height, pixels)
    }

    /// Convert to an `image::RgbImage` for use with `image::imageops`.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        // The buffer length is guaranteed by construction.
        image::RgbImage::from_fn(self.width, self.height, |x, y| {
            let idx = self.index(x, y);
            image::Rgb([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Channel count, fixed at 3.
    #[inline]
    pub fn channels(&self) -> usize {
        CHANNELS
    }

    /// Raw RGB bytes.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable RGB bytes. The length cannot change through a slice.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consume the raster and return its buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Byte offset of pixel `(x, y)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// Read pixel `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = self.index(x, y);
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    /// Read pixel `(x, y)` with coordinates clamped to the image edge.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> [u8; 3] {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    /// Write pixel `(x, y)`.
    #[inline]
    pub fn put(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let idx = self.index(x, y);
        self.pixels[idx..idx + CHANNELS].copy_from_slice(&rgb);
    }

    /// Apply `f` to every pixel, producing a new raster of the same size.
    pub fn map_pixels(&self, mut f: impl FnMut([u8; 3]) -> [u8; 3]) -> Self {
        let pixels = self
            .pixels
            .chunks_exact(CHANNELS)
            .flat_map(|px| f([px[0], px[1], px[2]]))
            .collect();
        Self {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

fn expected_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let img = RasterImage::new(100, 50, vec![0u8; 100 * 50 * 3]).unwrap();

        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 50);
        assert_eq!(img.pixel_count(), 5000);
        assert_eq!(img.byte_size(), 15000);
        assert_eq!(img.channels(), 3);
        assert!(!img.is_empty());
    }

    #[test]
    fn test_raster_rejects_short_buffer() {
        let err = RasterImage::new(10, 10, vec![0u8; 299]).unwrap_err();
        assert_eq!(err.expected, 300);
        assert_eq!(err.actual, 299);
    }

    #[test]
    fn test_raster_empty() {
        let img = RasterImage::new(0, 0, vec![]).unwrap();
        assert!(img.is_empty());
    }

    #[test]
    fn test_filled_and_get() {
        let img = RasterImage::filled(4, 3, [10, 20, 30]);
        assert_eq!(img.byte_size(), 36);
        assert_eq!(img.get(3, 2), [10, 20, 30]);
    }

    #[test]
    fn test_put_and_clamped_get() {
        let mut img = RasterImage::filled(2, 2, [0, 0, 0]);
        img.put(1, 1, [255, 128, 64]);
        assert_eq!(img.get(1, 1), [255, 128, 64]);
        assert_eq!(img.get_clamped(50, 50), [255, 128, 64]);
        assert_eq!(img.get_clamped(-5, -5), [0, 0, 0]);
    }

    #[test]
    fn test_from_gray_replicates_channels() {
        let img = RasterImage::from_gray(2, 1, &[7, 9]).unwrap();
        assert_eq!(img.pixels(), &[7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn test_rgb_image_round_trip() {
        let pixels: Vec<u8> = (0..(6 * 4 * 3)).map(|i| i as u8).collect();
        let img = RasterImage::new(6, 4, pixels.clone()).unwrap();
        let back = RasterImage::from_rgb_image(img.to_rgb_image());
        assert_eq!(back.pixels(), pixels.as_slice());
    }

    #[test]
    fn test_map_pixels() {
        let img = RasterImage::filled(3, 3, [1, 2, 3]);
        let inverted = img.map_pixels(|[r, g, b]| [255 - r, 255 - g, 255 - b]);
        assert_eq!(inverted.get(0, 0), [254, 253, 252]);
    }

    #[test]
    fn test_raster_error_display() {
        let err = RasterImage::new(2, 2, vec![0; 3]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "raster buffer mismatch: 2x2 needs 12 bytes, got 3"
        );
    }
}
