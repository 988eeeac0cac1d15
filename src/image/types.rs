//! Core image types: source images, normalized images, and media types.

use crate::error::{EnhanceError, Result};
use base64::Engine;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Media type every normalized image is encoded as.
pub const NORMALIZED_MEDIA_TYPE: &str = "image/jpeg";

/// Media type assumed when nothing else identifies the input.
pub const BASELINE_MEDIA_TYPE: &str = "image/jpeg";

/// Image formats recognised when labelling input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
    /// GIF format.
    Gif,
    /// Windows bitmap.
    Bmp,
    /// TIFF format.
    Tiff,
    /// HEIC/HEIF container (labelled only; not decodable here).
    Heic,
    /// AVIF format.
    Avif,
}

impl ImageFormat {
    /// Returns the canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Heic => "heic",
            Self::Avif => "avif",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Heic => "image/heic",
            Self::Avif => "image/avif",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jfif" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "heic" | "heif" => Some(Self::Heic),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        if data.starts_with(b"BM") && data.len() >= 14 {
            return Some(Self::Bmp);
        }

        if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            return Some(Self::Tiff);
        }

        if data.len() < 12 {
            return None;
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        // ISO-BMFF: ....ftyp<brand>
        if &data[4..8] == b"ftyp" {
            return match &data[8..12] {
                b"avif" | b"avis" => Some(Self::Avif),
                b"heic" | b"heix" | b"mif1" | b"msf1" | b"hevc" => Some(Self::Heic),
                _ => None,
            };
        }

        None
    }
}

fn is_generic_media_type(media_type: &str) -> bool {
    let media_type = media_type.trim();
    media_type.is_empty() || media_type.eq_ignore_ascii_case("application/octet-stream")
}

/// Resolves the media type an input file claims to be.
///
/// Tries, in order: the declared type (unless generic), the magic bytes,
/// the file extension, and finally [`BASELINE_MEDIA_TYPE`].
pub fn resolve_declared_media_type(
    declared: Option<&str>,
    data: &[u8],
    file_name: Option<&str>,
) -> String {
    if let Some(declared) = declared.filter(|d| !is_generic_media_type(d)) {
        return declared.trim().to_lowercase();
    }

    if let Some(format) = ImageFormat::from_magic_bytes(data) {
        return format.mime_type().to_string();
    }

    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .map(|f| f.mime_type())
        .unwrap_or(BASELINE_MEDIA_TYPE)
        .to_string()
}

/// A decoded user-supplied image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    raw: Vec<u8>,
    declared_media_type: String,
    decoded: DynamicImage,
}

impl SourceImage {
    /// Decodes `raw` into a source image.
    ///
    /// `declared_type` and `file_name` only label the input; decoding always
    /// goes by content.
    pub fn decode(
        raw: Vec<u8>,
        declared_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Self> {
        let declared_media_type = resolve_declared_media_type(declared_type, &raw, file_name);
        let decoded = image::load_from_memory(&raw).map_err(EnhanceError::ImageDecode)?;
        tracing::debug!(
            width = decoded.width(),
            height = decoded.height(),
            media_type = %declared_media_type,
            "decoded source image"
        );
        Ok(Self {
            raw,
            declared_media_type,
            decoded,
        })
    }

    /// Reads and decodes an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)?;
        let name = path.file_name().and_then(|n| n.to_str());
        Self::decode(raw, None, name)
    }

    /// Returns the original file bytes.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Returns the resolved declared media type.
    pub fn declared_media_type(&self) -> &str {
        &self.declared_media_type
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.decoded.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.decoded.height()
    }

    pub(crate) fn pixels(&self) -> &DynamicImage {
        &self.decoded
    }
}

/// A size-bounded JPEG ready to be sent for enhancement.
///
/// The bytes held here are exactly what is sent to the backend and what
/// the preview shows.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "normalized image should be submitted or saved"]
pub struct NormalizedImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl NormalizedImage {
    pub(crate) fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Encoded JPEG bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Always [`NORMALIZED_MEDIA_TYPE`].
    pub fn media_type(&self) -> &'static str {
        NORMALIZED_MEDIA_TYPE
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the size of the encoded data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type(), self.to_base64())
    }

    /// Saves the preview to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";
    const HEIC_MAGIC: [u8; 12] = *b"\x00\x00\x00\x18ftypheic";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&HEIC_MAGIC),
            Some(ImageFormat::Heic)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"hello"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("heif"), Some(ImageFormat::Heic));
        assert_eq!(ImageFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_declared_type_trusted_unless_generic() {
        assert_eq!(
            resolve_declared_media_type(Some("image/webp"), &PNG_MAGIC, None),
            "image/webp"
        );
        assert_eq!(
            resolve_declared_media_type(Some("application/octet-stream"), &PNG_MAGIC, None),
            "image/png"
        );
    }

    #[test]
    fn test_declared_type_extension_then_baseline() {
        assert_eq!(
            resolve_declared_media_type(Some(""), b"????", Some("IMG_0001.HEIC")),
            "image/heic"
        );
        assert_eq!(
            resolve_declared_media_type(None, b"????", Some("notes")),
            BASELINE_MEDIA_TYPE
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = SourceImage::decode(b"not an image".to_vec(), None, None).unwrap_err();
        assert!(matches!(err, EnhanceError::ImageDecode(_)));
        assert_eq!(err.kind(), crate::classify::ErrorKind::DecodeError);
    }

    #[test]
    fn test_normalized_data_url() {
        let img = NormalizedImage::new(vec![1, 2, 3], 1, 1);
        assert_eq!(img.to_data_url(), "data:image/jpeg;base64,AQID");
        assert_eq!(img.size(), 3);
    }
}
