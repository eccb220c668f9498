//! Separable Gaussian blur.

use crate::{TransformError, reflect101};
use image::RgbImage;
use ndarray::{Array3, ArrayView3};

/// Kernel extent in both directions.
pub const KERNEL_SIZE: usize = 15;

/// Standard deviation derived from the kernel size when none is given.
pub fn auto_sigma(size: usize) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalised 1-D Gaussian weights of length `size`.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = auto_sigma(size);
    let center = (size / 2) as f32;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= sum);
    weights
}

/// Blur with a [`KERNEL_SIZE`]-square Gaussian and reflect-101 borders.
pub fn blur(image: &RgbImage) -> Result<RgbImage, TransformError> {
    let (w, h) = image.dimensions();
    let (w, h) = (w as usize, h as usize);
    let src = ArrayView3::from_shape((h, w, 3), image.as_raw().as_slice())?.mapv(f32::from);

    let kernel = gaussian_kernel(KERNEL_SIZE);
    let radius = (KERNEL_SIZE / 2) as isize;

    let rows = Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, k)| k * src[[y, reflect101(x as isize + i as isize - radius, w), c]])
            .sum::<f32>()
    });
    let cols = Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, k)| k * rows[[reflect101(y as isize + i as isize - radius, h), x, c]])
            .sum::<f32>()
    });

    let raw: Vec<u8> = cols
        .iter()
        .map(|v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    RgbImage::from_raw(w as u32, h as u32, raw).ok_or(TransformError::EmptyImage)
}
