//! Encoded image bytes <-> rasters.

use crate::TransformError;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Decode an encoded image (PNG, JPEG, ... whatever the format sniffing
/// recognises).
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, TransformError> {
    image::load_from_memory(bytes).map_err(TransformError::Decode)
}

/// Encode an RGB raster as PNG.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, TransformError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(TransformError::Encode)?;
    Ok(out.into_inner())
}
