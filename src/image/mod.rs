//! Image intake and normalization.

mod normalizer;
mod types;

pub use normalizer::{normalize, normalize_bytes, target_dimensions, JPEG_QUALITY, MAX_DIMENSION};
pub use types::{
    resolve_declared_media_type, ImageFormat, NormalizedImage, SourceImage, BASELINE_MEDIA_TYPE,
    NORMALIZED_MEDIA_TYPE,
};
