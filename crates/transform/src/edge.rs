//! Canny edge detection on luminance.

use crate::{TransformError, reflect101};
use image::RgbImage;
use ndarray::{Array2, ArrayView3};

/// Gradient magnitude below which a pixel is never an edge.
pub const LOW_THRESHOLD: i32 = 100;
/// Gradient magnitude above which a pixel is always an edge.
pub const HIGH_THRESHOLD: i32 = 200;

/// tan(22.5°) and tan(67.5°), the sector bounds of the gradient direction.
const TAN_22_5: f64 = 0.414_213_562_373_095;
const TAN_67_5: f64 = 2.414_213_562_373_095;

/// Detect edges and expand the binary map to RGB.
pub fn edge_detect(image: &RgbImage) -> Result<RgbImage, TransformError> {
    let edges = canny(&luminance(image)?, LOW_THRESHOLD, HIGH_THRESHOLD);
    let (w, h) = image.dimensions();
    Ok(RgbImage::from_fn(w, h, |x, y| {
        let v = edges[[y as usize, x as usize]];
        image::Rgb([v, v, v])
    }))
}

/// 8-bit luminance, `0.299 R + 0.587 G + 0.114 B`, indexed `[y, x]`.
pub fn luminance(image: &RgbImage) -> Result<Array2<i32>, TransformError> {
    let (w, h) = image.dimensions();
    let rgb = ArrayView3::from_shape((h as usize, w as usize, 3), image.as_raw().as_slice())?;
    Ok(Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        let r = i32::from(rgb[[y, x, 0]]);
        let g = i32::from(rgb[[y, x, 1]]);
        let b = i32::from(rgb[[y, x, 2]]);
        (299 * r + 587 * g + 114 * b + 500) / 1000
    }))
}

/// 3x3 Sobel gradients with reflect-101 borders.
pub fn sobel(gray: &Array2<i32>) -> (Array2<i32>, Array2<i32>) {
    let (h, w) = gray.dim();
    let at = |y: usize, x: usize, dy: isize, dx: isize| {
        gray[[
            reflect101(y as isize + dy, h),
            reflect101(x as isize + dx, w),
        ]]
    };

    let gx = Array2::from_shape_fn((h, w), |(y, x)| {
        (at(y, x, -1, 1) + 2 * at(y, x, 0, 1) + at(y, x, 1, 1))
            - (at(y, x, -1, -1) + 2 * at(y, x, 0, -1) + at(y, x, 1, -1))
    });
    let gy = Array2::from_shape_fn((h, w), |(y, x)| {
        (at(y, x, 1, -1) + 2 * at(y, x, 1, 0) + at(y, x, 1, 1))
            - (at(y, x, -1, -1) + 2 * at(y, x, -1, 0) + at(y, x, -1, 1))
    });
    (gx, gy)
}

/// Canny detector with L1 gradient magnitude. Returns 255 on edges, 0
/// elsewhere.
pub fn canny(gray: &Array2<i32>, low: i32, high: i32) -> Array2<u8> {
    let (h, w) = gray.dim();
    let (gx, gy) = sobel(gray);
    let magnitude = Array2::from_shape_fn((h, w), |(y, x)| gx[[y, x]].abs() + gy[[y, x]].abs());
    let mag_at = |y: usize, x: usize, dy: isize, dx: isize| {
        let (ny, nx) = (y as isize + dy, x as isize + dx);
        if ny < 0 || nx < 0 || ny >= h as isize || nx >= w as isize {
            0
        } else {
            magnitude[[ny as usize, nx as usize]]
        }
    };

    // Non-maximum suppression along the quantised gradient direction.
    let thin = Array2::from_shape_fn((h, w), |(y, x)| {
        let m = magnitude[[y, x]];
        if m <= low {
            return 0;
        }
        let (sx, sy) = (gx[[y, x]], gy[[y, x]]);
        let (ax, ay) = (f64::from(sx.abs()), f64::from(sy.abs()));
        let ((dy1, dx1), (dy2, dx2)) = if ay <= ax * TAN_22_5 {
            ((0, -1), (0, 1))
        } else if ay >= ax * TAN_67_5 {
            ((-1, 0), (1, 0))
        } else if (sx > 0) == (sy > 0) {
            ((-1, -1), (1, 1))
        } else {
            ((-1, 1), (1, -1))
        };
        if m > mag_at(y, x, dy1, dx1) && m >= mag_at(y, x, dy2, dx2) {
            m
        } else {
            0
        }
    });

    // Hysteresis: grow from strong pixels through 8-connected weak ones.
    let mut edges = Array2::<u8>::zeros((h, w));
    let mut stack: Vec<(usize, usize)> = thin
        .indexed_iter()
        .filter(|(_, m)| **m > high)
        .map(|(idx, _)| idx)
        .collect();
    for &(y, x) in &stack {
        edges[[y, x]] = 255;
    }
    while let Some((y, x)) = stack.pop() {
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                let (ny, nx) = (y as isize + dy, x as isize + dx);
                if ny < 0 || nx < 0 || ny >= h as isize || nx >= w as isize {
                    continue;
                }
                let (ny, nx) = (ny as usize, nx as usize);
                if edges[[ny, nx]] == 0 && thin[[ny, nx]] > low {
                    edges[[ny, nx]] = 255;
                    stack.push((ny, nx));
                }
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(w: usize, h: usize, at: usize) -> Array2<i32> {
        Array2::from_shape_fn((h, w), |(_, x)| if x < at { 0 } else { 255 })
    }

    #[test]
    fn flat_image_has_no_gradient() {
        let gray = Array2::from_elem((8, 8), 77);
        let (gx, gy) = sobel(&gray);
        assert!(gx.iter().all(|v| *v == 0));
        assert!(gy.iter().all(|v| *v == 0));
        assert!(canny(&gray, LOW_THRESHOLD, HIGH_THRESHOLD).iter().all(|v| *v == 0));
    }

    #[test]
    fn vertical_step_gives_one_pixel_wide_edge() {
        let edges = canny(&step(16, 10, 8), LOW_THRESHOLD, HIGH_THRESHOLD);
        for y in 0..10 {
            let row: Vec<u8> = (0..16).map(|x| edges[[y, x]]).collect();
            assert_eq!(row.iter().filter(|v| **v == 255).count(), 1, "row {y}: {row:?}");
            assert_eq!(edges[[y, 7]], 255);
        }
    }

    #[test]
    fn weak_step_is_ignored() {
        // A step of 20 gives |gx| = 80, below the low threshold.
        let gray = Array2::from_shape_fn((10, 10), |(_, x)| if x < 5 { 100 } else { 120 });
        assert!(canny(&gray, LOW_THRESHOLD, HIGH_THRESHOLD).iter().all(|v| *v == 0));
    }
}
