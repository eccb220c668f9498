//! Funhouse-mirror remaps.
//!
//! Both effects build a per-pixel source coordinate map for the whole
//! frame and then gather through it. Pixels outside the affected disc map
//! onto themselves, so they come out identical to the input.

use image::RgbImage;
use ndarray::Array2;

/// Exponent of the power-law distance remap used by [`reduce`].
pub const COMPRESS_FACTOR: f64 = 0.8;

/// Source coordinates, indexed `[y, x]`.
pub type CoordMap = Array2<(u32, u32)>;

/// Radius of the affected disc: a third of the smaller dimension.
pub fn radius(width: u32, height: u32) -> f64 {
    f64::from(width.min(height)) / 3.0
}

/// Radial magnify.
pub fn enlarge(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    gather(image, &enlarge_map(w, h))
}

/// Radial shrink.
pub fn reduce(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    gather(image, &reduce_map(w, h))
}

/// Coordinate map for [`enlarge`].
///
/// For an offset `(tx, ty)` from the integer center inside the disc,
/// samples `(tx / 2 * s + cx, ty / 2 * s + cy)` with `s = d / (R / 2)`.
pub fn enlarge_map(width: u32, height: u32) -> CoordMap {
    let r = radius(width, height);
    let half = r / 2.0;
    let cx = f64::from(width / 2);
    let cy = f64::from(height / 2);

    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let tx = x as f64 - cx;
        let ty = y as f64 - cy;
        let dist_sq = tx * tx + ty * ty;
        if dist_sq >= r * r {
            return (x as u32, y as u32);
        }

        let scale = dist_sq.sqrt() / half;
        (
            clamp_coord(tx / 2.0 * scale + cx, width),
            clamp_coord(ty / 2.0 * scale + cy, height),
        )
    })
}

/// Coordinate map for [`reduce`].
///
/// Inside the disc around the integer center the distance is remapped as
/// `d^0.8 * R / R^0.8`, keeping the angle. The remap is continuous at the
/// rim, where it is the identity.
pub fn reduce_map(width: u32, height: u32) -> CoordMap {
    let r = radius(width, height);
    let norm = r / r.powf(COMPRESS_FACTOR);
    let cx = f64::from(width / 2);
    let cy = f64::from(height / 2);

    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let tx = x as f64 - cx;
        let ty = y as f64 - cy;
        let distance = (tx * tx + ty * ty).sqrt();
        if distance >= r {
            return (x as u32, y as u32);
        }

        let angle = ty.atan2(tx);
        let dist_src = distance.powf(COMPRESS_FACTOR) * norm;
        (
            clamp_coord(cx + dist_src * angle.cos(), width),
            clamp_coord(cy + dist_src * angle.sin(), height),
        )
    })
}

/// Build the output by sampling `image` at the mapped coordinates.
pub fn gather(image: &RgbImage, map: &CoordMap) -> RgbImage {
    let (w, h) = image.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let (sx, sy) = map[[y as usize, x as usize]];
        *image.get_pixel(sx, sy)
    })
}

/// Truncate toward zero, then clamp into `0..len`.
fn clamp_coord(v: f64, len: u32) -> u32 {
    v.trunc().clamp(0.0, f64::from(len.saturating_sub(1))) as u32
}
