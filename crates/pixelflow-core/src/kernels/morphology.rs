//! Morphology with a flat square structuring element, per channel.

use super::KernelError;
use crate::operation::MorphOp;
use crate::raster::RasterImage;
use crate::registry::MorphMethod;

#[derive(Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

pub fn apply(image: &RasterImage, op: &MorphOp) -> Result<RasterImage, KernelError> {
    let size = op.kernel_size as usize;
    let out = match op.method {
        MorphMethod::Dilate => repeat(image, size, op.iterations, Extremum::Max),
        MorphMethod::Erode => repeat(image, size, op.iterations, Extremum::Min),
        MorphMethod::Opening => opening(image, size),
        MorphMethod::Closing => closing(image, size),
        MorphMethod::Gradient => {
            let dilated = rank(image, size, Extremum::Max);
            let eroded = rank(image, size, Extremum::Min);
            combine(&dilated, &eroded, |a, b| a.saturating_sub(b))
        }
        MorphMethod::TopHat => combine(image, &opening(image, size), |a, b| a.saturating_sub(b)),
        MorphMethod::BlackHat => combine(&closing(image, size), image, |a, b| a.saturating_sub(b)),
    };
    Ok(out)
}

pub fn dilate(image: &RasterImage, size: usize) -> RasterImage {
    rank(image, size, Extremum::Max)
}

pub fn erode(image: &RasterImage, size: usize) -> RasterImage {
    rank(image, size, Extremum::Min)
}

fn opening(image: &RasterImage, size: usize) -> RasterImage {
    dilate(&erode(image, size), size)
}

fn closing(image: &RasterImage, size: usize) -> RasterImage {
    erode(&dilate(image, size), size)
}

fn repeat(image: &RasterImage, size: usize, iterations: u32, kind: Extremum) -> RasterImage {
    let mut current = rank(image, size, kind);
    for _ in 1..iterations {
        current = rank(&current, size, kind);
    }
    current
}

/// Square max/min filter, computed as a row pass then a column pass.
fn rank(image: &RasterImage, size: usize, kind: Extremum) -> RasterImage {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let r = (size / 2) as isize;
    let pick = |a: u8, b: u8| match kind {
        Extremum::Max => a.max(b),
        Extremum::Min => a.min(b),
    };

    let src = image.pixels();
    let mut rows = vec![0u8; src.len()];
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = src[(y * w + x) * 3 + c];
                for d in -r..=r {
                    let sx = (x as isize + d).clamp(0, w as isize - 1) as usize;
                    acc = pick(acc, src[(y * w + sx) * 3 + c]);
                }
                rows[(y * w + x) * 3 + c] = acc;
            }
        }
    }

    let mut out = image.clone();
    let dst = out.pixels_mut();
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = rows[(y * w + x) * 3 + c];
                for d in -r..=r {
                    let sy = (y as isize + d).clamp(0, h as isize - 1) as usize;
                    acc = pick(acc, rows[(sy * w + x) * 3 + c]);
                }
                dst[(y * w + x) * 3 + c] = acc;
            }
        }
    }
    out
}

fn combine(a: &RasterImage, b: &RasterImage, f: impl Fn(u8, u8) -> u8) -> RasterImage {
    let mut out = a.clone();
    for (dst, &other) in out.pixels_mut().iter_mut().zip(b.pixels()) {
        *dst = f(*dst, other);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::test_images;

    fn op(method: MorphMethod, kernel_size: u32, iterations: u32) -> MorphOp {
        MorphOp {
            method,
            kernel_size,
            iterations,
        }
    }

    fn white_count(img: &RasterImage) -> usize {
        img.pixels().chunks_exact(3).filter(|px| px[0] == 255).count()
    }

    #[test]
    fn test_dilate_grows_and_erode_shrinks() {
        let img = test_images::square(20, 6);
        let base = white_count(&img);
        let dilated = apply(&img, &op(MorphMethod::Dilate, 3, 1)).unwrap();
        assert_eq!(white_count(&dilated), 8 * 8);
        let eroded = apply(&img, &op(MorphMethod::Erode, 3, 1)).unwrap();
        assert_eq!(white_count(&eroded), 4 * 4);
        assert!(white_count(&dilated) > base && base > white_count(&eroded));
    }

    #[test]
    fn test_iterations_compound() {
        let img = test_images::square(20, 6);
        let twice = apply(&img, &op(MorphMethod::Dilate, 3, 2)).unwrap();
        assert_eq!(white_count(&twice), 10 * 10);
    }

    #[test]
    fn test_opening_removes_speck() {
        let mut img = test_images::square(20, 8);
        img.put(1, 1, [255, 255, 255]);
        let opened = apply(&img, &op(MorphMethod::Opening, 3, 1)).unwrap();
        assert_eq!(opened.get(1, 1), [0, 0, 0]);
        assert_eq!(white_count(&opened), 8 * 8);
    }

    #[test]
    fn test_closing_fills_hole() {
        let mut img = test_images::square(20, 8);
        img.put(10, 10, [0, 0, 0]);
        let closed = apply(&img, &op(MorphMethod::Closing, 3, 1)).unwrap();
        assert_eq!(closed.get(10, 10), [255, 255, 255]);
    }

    #[test]
    fn test_gradient_and_hats() {
        let mut img = test_images::square(20, 8);
        img.put(1, 1, [255, 255, 255]);

        let gradient = apply(&img, &op(MorphMethod::Gradient, 3, 1)).unwrap();
        assert_eq!(gradient.get(10, 10), [0, 0, 0]);
        assert_eq!(gradient.get(6, 10), [255, 255, 255]);

        let tophat = apply(&img, &op(MorphMethod::TopHat, 3, 1)).unwrap();
        assert_eq!(tophat.get(1, 1), [255, 255, 255]);
        assert_eq!(tophat.get(10, 10), [0, 0, 0]);

        let flat = RasterImage::filled(6, 6, [77, 77, 77]);
        let blackhat = apply(&flat, &op(MorphMethod::BlackHat, 5, 1)).unwrap();
        assert!(blackhat.pixels().iter().all(|&v| v == 0));
    }
}
