//! Geometric transforms: resize, rotate, affine and perspective warps, and
//! pixel-rectangle crop.
//!
//! Warps use inverse mapping: for every output pixel the source position is
//! computed through the inverted transform and sampled bilinearly.
//! Positions outside the source are black.
//!
//! For rotation by angle θ about the centers:
//! ```text
//! src_x = (dst_x - cx) * cos(-θ) - (dst_y - cy) * sin(-θ) + src_cx
//! src_y = (dst_x - cx) * sin(-θ) + (dst_y - cy) * cos(-θ) + src_cy
//! ```

use image::imageops::FilterType;
use tracing::debug;

use super::KernelError;
use crate::operation::GeometricOp;
use crate::raster::RasterImage;

/// Determinants below this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

pub fn apply(image: &RasterImage, op: &GeometricOp) -> Result<RasterImage, KernelError> {
    match *op {
        GeometricOp::Resize { width, height } => resize(image, width, height, FilterType::Triangle),
        GeometricOp::Rotate { angle } => Ok(rotate(image, angle)),
        GeometricOp::Affine { matrix } => warp_affine(image, &matrix),
        GeometricOp::Perspective { matrix } => warp_perspective(image, &matrix),
    }
}

/// Resize to exact dimensions.
pub fn resize(
    image: &RasterImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RasterImage, KernelError> {
    if width == 0 || height == 0 {
        return Err(KernelError::Unsupported(format!(
            "cannot resize to {width}x{height}"
        )));
    }
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }
    let resized = image::imageops::resize(&image.to_rgb_image(), width, height, filter);
    Ok(RasterImage::from_rgb_image(resized))
}

/// Bounding box of a `width x height` rectangle rotated by `angle_degrees`.
pub fn rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let normalized = angle_degrees % 360.0;
    let abs = normalized.abs();

    if abs < 0.001 || (360.0 - abs).abs() < 0.001 || (abs - 180.0).abs() < 0.001 {
        return (width, height);
    }
    if (abs - 90.0).abs() < 0.001 || (abs - 270.0).abs() < 0.001 {
        return (height, width);
    }

    let rad = angle_degrees.to_radians();
    let (cos, sin) = (rad.cos().abs(), rad.sin().abs());
    let (w, h) = (width as f64, height as f64);
    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;
    (new_w.max(1), new_h.max(1))
}

/// Rotate about the center; positive angles turn counter-clockwise and the
/// canvas grows to hold the whole image.
pub fn rotate(image: &RasterImage, angle_degrees: f64) -> RasterImage {
    if (angle_degrees % 360.0).abs() < 0.001 {
        return image.clone();
    }

    let (src_w, src_h) = (image.width() as f64, image.height() as f64);
    let (dst_w, dst_h) = rotated_bounds(image.width(), image.height(), angle_degrees);

    let rad = -angle_degrees.to_radians();
    let (cos, sin) = (rad.cos(), rad.sin());
    // Pixel centers, so that quarter turns land exactly on the grid.
    let (src_cx, src_cy) = ((src_w - 1.0) / 2.0, (src_h - 1.0) / 2.0);
    let (dst_cx, dst_cy) = ((dst_w as f64 - 1.0) / 2.0, (dst_h as f64 - 1.0) / 2.0);

    let mut out = RasterImage::filled(dst_w, dst_h, [0, 0, 0]);
    for dst_y in 0..dst_h {
        for dst_x in 0..dst_w {
            let dx = dst_x as f64 - dst_cx;
            let dy = dst_y as f64 - dst_cy;
            // Image y points down, so the visual rotation flips the sign of sin.
            let src_x = dx * cos + dy * sin + src_cx;
            let src_y = -dx * sin + dy * cos + src_cy;
            out.put(dst_x, dst_y, sample_bilinear(image, src_x, src_y));
        }
    }
    out
}

/// Warp through a 2x3 source-to-destination matrix; output keeps the input size.
pub fn warp_affine(image: &RasterImage, m: &[f64; 6]) -> Result<RasterImage, KernelError> {
    let det = m[0] * m[4] - m[1] * m[3];
    if det.abs() < SINGULAR_EPSILON {
        return Err(KernelError::SingularMatrix);
    }
    // Inverse of [[a b tx] [c d ty]].
    let inv = [
        m[4] / det,
        -m[1] / det,
        (m[1] * m[5] - m[4] * m[2]) / det,
        -m[3] / det,
        m[0] / det,
        (m[3] * m[2] - m[0] * m[5]) / det,
    ];
    debug!(?inv, "affine inverse");

    let (w, h) = image.dimensions();
    let mut out = RasterImage::filled(w, h, [0, 0, 0]);
    for y in 0..h {
        for x in 0..w {
            let (xf, yf) = (x as f64, y as f64);
            let sx = inv[0] * xf + inv[1] * yf + inv[2];
            let sy = inv[3] * xf + inv[4] * yf + inv[5];
            out.put(x, y, sample_bilinear(image, sx, sy));
        }
    }
    Ok(out)
}

/// Warp through a 3x3 source-to-destination homography; output keeps the
/// input size.
pub fn warp_perspective(image: &RasterImage, m: &[f64; 9]) -> Result<RasterImage, KernelError> {
    let inv = invert3(m).ok_or(KernelError::SingularMatrix)?;

    let (w, h) = image.dimensions();
    let mut out = RasterImage::filled(w, h, [0, 0, 0]);
    for y in 0..h {
        for x in 0..w {
            let (xf, yf) = (x as f64, y as f64);
            let z = inv[6] * xf + inv[7] * yf + inv[8];
            if z.abs() < SINGULAR_EPSILON {
                continue;
            }
            let sx = (inv[0] * xf + inv[1] * yf + inv[2]) / z;
            let sy = (inv[3] * xf + inv[4] * yf + inv[5]) / z;
            out.put(x, y, sample_bilinear(image, sx, sy));
        }
    }
    Ok(out)
}

fn invert3(m: &[f64; 9]) -> Option<[f64; 9]> {
    let c00 = m[4] * m[8] - m[5] * m[7];
    let c01 = m[5] * m[6] - m[3] * m[8];
    let c02 = m[3] * m[7] - m[4] * m[6];
    let det = m[0] * c00 + m[1] * c01 + m[2] * c02;
    if det.abs() < SINGULAR_EPSILON {
        return None;
    }
    let d = 1.0 / det;
    Some([
        c00 * d,
        (m[2] * m[7] - m[1] * m[8]) * d,
        (m[1] * m[5] - m[2] * m[4]) * d,
        c01 * d,
        (m[0] * m[8] - m[2] * m[6]) * d,
        (m[2] * m[3] - m[0] * m[5]) * d,
        c02 * d,
        (m[1] * m[6] - m[0] * m[7]) * d,
        (m[0] * m[4] - m[1] * m[3]) * d,
    ])
}

/// Copy the pixel rectangle `[left, right) x [top, bottom)`.
///
/// The caller guarantees `left < right <= width` and `top < bottom <= height`.
pub fn crop(image: &RasterImage, left: u32, top: u32, right: u32, bottom: u32) -> Result<RasterImage, KernelError> {
    let out_w = right - left;
    let out_h = bottom - top;
    let row_bytes = out_w as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * out_h as usize);

    let src = image.pixels();
    for y in top..bottom {
        let start = image.index(left, y);
        pixels.extend_from_slice(&src[start..start + row_bytes]);
    }
    Ok(RasterImage::new(out_w, out_h, pixels)?)
}

#[inline]
fn pixel_f64(image: &RasterImage, x: u32, y: u32) -> [f64; 3] {
    image.get(x, y).map(|v| v as f64)
}

/// Bilinear sample; black outside `[0, w-1] x [0, h-1]`.
fn sample_bilinear(image: &RasterImage, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = image.dimensions();
    let (max_x, max_y) = ((w - 1) as f64, (h - 1) as f64);
    // Allow a little slack so exact grid positions survive rounding.
    if !(-1e-6..=max_x + 1e-6).contains(&x) || !(-1e-6..=max_y + 1e-6).contains(&y) {
        return [0, 0, 0];
    }
    let (x, y) = (x.clamp(0.0, max_x), y.clamp(0.0, max_y));

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = pixel_f64(image, x0, y0);
    let p10 = pixel_f64(image, x1, y0);
    let p01 = pixel_f64(image, x0, y1);
    let p11 = pixel_f64(image, x1, y1);

    let mut result = [0u8; 3];
    for i in 0..3 {
        let v = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
        result[i] = v.clamp(0.0, 255.0).round() as u8;
    }
    result
}
