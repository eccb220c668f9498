//! Snapshot effects.
//!
//! Every effect takes an image of any channel layout, normalises it to
//! 8-bit RGB and returns an RGB image of the same dimensions.
//!
//! | Effect | Name | Description |
//! |--------|------|-------------|
//! | [`Effect::Enlarge`] | `enlarge` | Radial magnify around the center |
//! | [`Effect::Reduce`] | `reduce` | Radial shrink around the center |
//! | [`Effect::Blur`] | `blur` | 15x15 Gaussian smoothing |
//! | [`Effect::EdgeDetect`] | `edge_detect` | Canny edges, expanded to RGB |

use image::{DynamicImage, RgbImage};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub mod blur;
pub mod codec;
pub mod edge;
pub mod remap;

pub use codec::{decode, encode_png};

/// A named image effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Funhouse-mirror magnify.
    Enlarge,
    /// Funhouse-mirror shrink.
    Reduce,
    /// Gaussian blur.
    Blur,
    /// Edge detection.
    EdgeDetect,
}

impl Effect {
    /// All effects, in a stable order.
    pub const ALL: [Effect; 4] = [
        Effect::Enlarge,
        Effect::Reduce,
        Effect::Blur,
        Effect::EdgeDetect,
    ];

    /// Canonical effect name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Enlarge => "enlarge",
            Effect::Reduce => "reduce",
            Effect::Blur => "blur",
            Effect::EdgeDetect => "edge_detect",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An effect name no transform is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown effect type: {0}")]
pub struct UnknownEffect(pub String);

impl FromStr for Effect {
    type Err = UnknownEffect;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "enlarge" => Ok(Effect::Enlarge),
            "reduce" => Ok(Effect::Reduce),
            "blur" => Ok(Effect::Blur),
            "edge_detect" | "edge_detection" => Ok(Effect::EdgeDetect),
            other => Err(UnknownEffect(other.to_owned())),
        }
    }
}

/// Errors raised while decoding, transforming or encoding an image.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The image has zero width or height.
    #[error("image has no pixels")]
    EmptyImage,
    /// The input bytes are not a supported image.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    /// The output could not be encoded.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    /// A raster buffer did not match its declared dimensions.
    #[error("raster shape mismatch: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Apply `effect` to `image`.
pub fn apply(image: &DynamicImage, effect: Effect) -> Result<RgbImage, TransformError> {
    let rgb = normalize(image);
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(TransformError::EmptyImage);
    }

    match effect {
        Effect::Enlarge => Ok(remap::enlarge(&rgb)),
        Effect::Reduce => Ok(remap::reduce(&rgb)),
        Effect::Blur => blur::blur(&rgb),
        Effect::EdgeDetect => edge::edge_detect(&rgb),
    }
}

/// Convert any channel layout (gray, gray+alpha, RGBA, 16-bit) to 8-bit RGB.
pub fn normalize(image: &DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => other.to_rgb8(),
    }
}

/// Map an out-of-range index back into `0..len` by mirroring around the
/// edge pixels without repeating them (`gfedcb|abcdefgh|gfedcba`).
pub(crate) fn reflect101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::reflect101;

    #[test]
    fn reflect101_mirrors_without_repeating_the_edge() {
        assert_eq!(reflect101(-1, 8), 1);
        assert_eq!(reflect101(-3, 8), 3);
        assert_eq!(reflect101(8, 8), 6);
        assert_eq!(reflect101(10, 8), 4);
        assert_eq!(reflect101(4, 8), 4);
    }

    #[test]
    fn reflect101_handles_kernels_wider_than_the_image() {
        assert_eq!(reflect101(-7, 3), 1);
        assert_eq!(reflect101(9, 3), 1);
        assert_eq!(reflect101(-5, 1), 0);
    }
}
