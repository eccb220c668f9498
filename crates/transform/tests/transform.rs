//! Effect behaviour on whole images.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, RgbaImage};
use snapfx_transform::{Effect, TransformError, UnknownEffect, apply, decode, encode_png, remap};
use std::io::Cursor;

/// A deterministic, non-symmetric test pattern.
fn pattern(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            (x * 7 % 256) as u8,
            (y * 13 % 256) as u8,
            ((x * y) % 251) as u8,
        ])
    })
}

fn jpeg(image: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

#[test]
fn effect_names_parse() {
    assert_eq!("enlarge".parse::<Effect>(), Ok(Effect::Enlarge));
    assert_eq!("reduce".parse::<Effect>(), Ok(Effect::Reduce));
    assert_eq!("blur".parse::<Effect>(), Ok(Effect::Blur));
    assert_eq!("edge_detect".parse::<Effect>(), Ok(Effect::EdgeDetect));
    assert_eq!("edge_detection".parse::<Effect>(), Ok(Effect::EdgeDetect));
    for effect in Effect::ALL {
        assert_eq!(effect.as_str().parse::<Effect>(), Ok(effect));
    }
}

#[test]
fn unknown_effect_message() {
    let err = "triangulate".parse::<Effect>().unwrap_err();
    assert_eq!(err, UnknownEffect("triangulate".into()));
    assert_eq!(err.to_string(), "Unknown effect type: triangulate");
}

#[test]
fn every_effect_preserves_dimensions() {
    let input = DynamicImage::ImageRgb8(pattern(37, 23));
    for effect in Effect::ALL {
        let out = apply(&input, effect).unwrap();
        assert_eq!(out.dimensions(), (37, 23), "{effect}");
    }
}

#[test]
fn radial_effects_fix_the_center_pixel() {
    for (w, h) in [(80, 60), (61, 61), (81, 61), (60, 61)] {
        let img = pattern(w, h);
        let input = DynamicImage::ImageRgb8(img.clone());
        let (cx, cy) = (w / 2, h / 2);
        for effect in [Effect::Enlarge, Effect::Reduce] {
            let out = apply(&input, effect).unwrap();
            assert_eq!(out.get_pixel(cx, cy), img.get_pixel(cx, cy), "{effect} {w}x{h}");
        }
    }
}

#[test]
fn radial_effects_leave_outside_of_disc_untouched() {
    let (w, h) = (80, 60);
    let img = pattern(w, h);
    let input = DynamicImage::ImageRgb8(img.clone());
    let r = remap::radius(w, h);
    for effect in [Effect::Enlarge, Effect::Reduce] {
        let out = apply(&input, effect).unwrap();
        let mut changed_inside = 0;
        for (x, y, px) in out.enumerate_pixels() {
            let tx = x as f64 - f64::from(w / 2);
            let ty = y as f64 - f64::from(h / 2);
            if (tx * tx + ty * ty).sqrt() >= r + 1.0 {
                assert_eq!(px, img.get_pixel(x, y), "{effect} at ({x}, {y})");
            } else if px != img.get_pixel(x, y) {
                changed_inside += 1;
            }
        }
        assert!(changed_inside > 0, "{effect} did nothing");
    }
}

#[test]
fn blur_keeps_solid_color() {
    let solid = RgbImage::from_pixel(64, 64, Rgb([200, 40, 90]));
    let out = apply(&DynamicImage::ImageRgb8(solid.clone()), Effect::Blur).unwrap();
    assert_eq!(out, solid);
}

#[test]
fn blur_of_solid_jpeg_is_approximately_unchanged() {
    let solid = RgbImage::from_pixel(64, 64, Rgb([200, 40, 90]));
    let decoded = decode(&jpeg(&solid)).unwrap();
    let before = decoded.to_rgb8();
    let out = apply(&decoded, Effect::Blur).unwrap();
    assert_eq!(out.dimensions(), (64, 64));
    for (a, b) in out.pixels().zip(before.pixels()) {
        for c in 0..3 {
            assert!(a.0[c].abs_diff(b.0[c]) <= 3, "{a:?} vs {b:?}");
        }
    }
}

#[test]
fn blur_smooths_a_hard_edge() {
    let img = RgbImage::from_fn(32, 8, |x, _| if x < 16 { Rgb([0; 3]) } else { Rgb([255; 3]) });
    let out = apply(&DynamicImage::ImageRgb8(img), Effect::Blur).unwrap();
    let left = out.get_pixel(15, 4).0[0];
    let right = out.get_pixel(16, 4).0[0];
    assert!(left > 0 && left < 128, "{left}");
    assert!(right > 128 && right < 255, "{right}");
    assert_eq!(out.get_pixel(0, 4).0[0], 0);
}

#[test]
fn edge_detect_expands_to_rgb() {
    let img = RgbImage::from_fn(24, 12, |x, _| if x < 12 { Rgb([0; 3]) } else { Rgb([255; 3]) });
    let out = apply(&DynamicImage::ImageRgb8(img), Effect::EdgeDetect).unwrap();
    assert_eq!(out.dimensions(), (24, 12));
    for y in 0..12 {
        assert_eq!(out.get_pixel(11, y), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(2, y), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(20, y), &Rgb([0, 0, 0]));
    }
}

#[test]
fn grayscale_and_rgba_inputs_are_normalised() {
    let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 10, Luma([90])));
    let out = apply(&gray, Effect::Enlarge).unwrap();
    assert_eq!(out.get_pixel(3, 3), &Rgb([90, 90, 90]));

    let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 10, image::Rgba([1, 2, 3, 4])));
    let out = apply(&rgba, Effect::EdgeDetect).unwrap();
    assert_eq!(out.dimensions(), (20, 10));
}

#[test]
fn empty_image_is_rejected() {
    let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 5));
    assert!(matches!(
        apply(&empty, Effect::Blur),
        Err(TransformError::EmptyImage)
    ));
}

#[test]
fn png_encoding_is_lossless() {
    let img = pattern(33, 17);
    let png = encode_png(&img).unwrap();
    assert_eq!(decode(&png).unwrap().to_rgb8(), img);
}

#[test]
fn garbage_does_not_decode() {
    assert!(matches!(
        decode(b"definitely not an image"),
        Err(TransformError::Decode(_))
    ));
}
