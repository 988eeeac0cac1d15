//! Image normalization: decode, bound the size, re-encode as JPEG.

use crate::error::{EnhanceError, Result};
use crate::image::types::{NormalizedImage, SourceImage};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

/// Upper bound for either side of a normalized image.
pub const MAX_DIMENSION: u32 = 2048;

/// JPEG quality used for every normalized image.
pub const JPEG_QUALITY: u8 = 90;

/// Computes the bounded dimensions for a `width` x `height` image.
///
/// Images that already fit are returned unchanged. Otherwise the longer side
/// becomes `max_dimension` and the shorter side is scaled by the same ratio
/// and rounded.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale_side = |side: u32, longest: u32| -> u32 {
        let scaled = (f64::from(side) * f64::from(max_dimension) / f64::from(longest)).round();
        (scaled as u32).clamp(1, max_dimension)
    };

    if width > height {
        (max_dimension, scale_side(height, width))
    } else {
        (scale_side(width, height), max_dimension)
    }
}

/// Normalizes a decoded source image.
pub fn normalize(source: &SourceImage) -> Result<NormalizedImage> {
    normalize_pixels(source.pixels())
}

/// Decodes and normalizes raw image bytes.
pub fn normalize_bytes(data: &[u8]) -> Result<NormalizedImage> {
    let decoded = image::load_from_memory(data).map_err(EnhanceError::ImageDecode)?;
    normalize_pixels(&decoded)
}

fn normalize_pixels(img: &DynamicImage) -> Result<NormalizedImage> {
    let (width, height) = (img.width(), img.height());
    let (target_w, target_h) = target_dimensions(width, height, MAX_DIMENSION);

    let rgb = if (target_w, target_h) == (width, height) {
        flatten_to_rgb(img)
    } else {
        tracing::debug!(
            from = %format!("{width}x{height}"),
            to = %format!("{target_w}x{target_h}"),
            "resizing oversized image"
        );
        flatten_to_rgb(&img.resize_exact(target_w, target_h, FilterType::Lanczos3))
    };

    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY);
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(EnhanceError::ImageEncode)?;

    tracing::debug!(
        width = target_w,
        height = target_h,
        bytes = data.len(),
        "normalized image"
    );

    Ok(NormalizedImage::new(data, target_w, target_h))
}

/// Composites any alpha channel over white, since JPEG has none.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let alpha = u16::from(src[3]);
        let blend = |c: u8| -> u8 { ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8 };
        *dst = Rgb([blend(src[0]), blend(src[1]), blend(src[2])]);
    }
    out
}
