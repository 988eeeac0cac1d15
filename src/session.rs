//! Single-user session state: the current image, the pending flag, and the
//! last result.

use crate::classify::ErrorKind;
use crate::client::EnhanceClient;
use crate::error::{EnhanceError, Result};
use crate::image::{normalize, NormalizedImage, SourceImage};
use crate::prompt::{resolve_prompt, EnhancementStyle};
use crate::request::{EnhancementRequest, EnhancementResult};
use base64::Engine;
use std::future::Future;
use std::path::{Path, PathBuf};

/// File name used for downloaded results.
pub const DOWNLOAD_FILE_NAME: &str = "enhanced_image.png";

/// State of one enhancement session.
///
/// Holds at most one normalized image and one result. Enhancement takes
/// `&mut self`, so only one request can be in flight per session.
#[derive(Debug, Default)]
pub struct Session {
    image: Option<NormalizedImage>,
    result: Option<EnhancementResult>,
    processing: bool,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes and normalizes `data`, replacing any current image.
    ///
    /// The previous image and result are released before the new image is
    /// installed. On decode failure the session is left idle with a
    /// `DecodeError` result.
    pub fn load(
        &mut self,
        data: Vec<u8>,
        declared_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<&NormalizedImage> {
        self.release();

        let normalized = SourceImage::decode(data, declared_type, file_name)
            .and_then(|source| normalize(&source));

        match normalized {
            Ok(image) => Ok(&*self.image.insert(image)),
            Err(e) => {
                tracing::warn!("failed to load image: {e}");
                self.result = Some(EnhancementResult::failure(e.kind(), e.user_message()));
                Err(e)
            }
        }
    }

    /// Reads `path` and loads it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&NormalizedImage> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path.file_name().and_then(|n| n.to_str());
        self.load(data, None, name)
    }

    /// Returns the current normalized image.
    pub fn image(&self) -> Option<&NormalizedImage> {
        self.image.as_ref()
    }

    /// Returns the last result.
    pub fn result(&self) -> Option<&EnhancementResult> {
        self.result.as_ref()
    }

    /// True while a request is pending.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// True when an image is loaded and nothing is pending.
    pub fn can_enhance(&self) -> bool {
        self.image.is_some() && !self.processing
    }

    /// Builds the request for the current image.
    pub fn request(
        &self,
        style: EnhancementStyle,
        custom: Option<&str>,
    ) -> Option<EnhancementRequest> {
        self.image
            .as_ref()
            .map(|image| EnhancementRequest::from_normalized(image, resolve_prompt(style, custom)))
    }

    /// Submits the current image. Without an image this is a no-op that
    /// returns `None`.
    pub async fn enhance(
        &mut self,
        client: &EnhanceClient,
        style: EnhancementStyle,
        custom: Option<&str>,
    ) -> Option<&EnhancementResult> {
        self.enhance_until(client, style, custom, std::future::pending())
            .await
    }

    /// Like [`enhance`](Self::enhance), abandoning the request once `cancel`
    /// resolves.
    pub async fn enhance_until<F>(
        &mut self,
        client: &EnhanceClient,
        style: EnhancementStyle,
        custom: Option<&str>,
        cancel: F,
    ) -> Option<&EnhancementResult>
    where
        F: Future<Output = ()>,
    {
        let request = self.request(style, custom)?;

        self.result = None;
        tracing::debug!(style = %style, "submitting enhancement");
        let result = {
            let _pending = Pending::start(&mut self.processing);
            client.submit_until(&request, cancel).await
        };

        if let EnhancementResult::Failure { kind, message } = &result {
            tracing::warn!(kind = %kind, "enhancement failed: {message}");
        }
        Some(&*self.result.insert(result))
    }

    /// Writes the successful result as [`DOWNLOAD_FILE_NAME`] in `dir`.
    ///
    /// Results that are not PNG are re-encoded so the file matches its name.
    pub fn download(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let Some(EnhancementResult::Success { encoded_image }) = &self.result else {
            return Err(EnhanceError::InvalidRequest(
                "no enhanced image to download".into(),
            ));
        };

        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded_image)
            .map_err(|e| EnhanceError::Decode(e.to_string()))?;

        let png = if crate::image::ImageFormat::from_magic_bytes(&data)
            == Some(crate::image::ImageFormat::Png)
        {
            data
        } else {
            let decoded = image::load_from_memory(&data).map_err(EnhanceError::ImageDecode)?;
            let mut out = std::io::Cursor::new(Vec::new());
            decoded
                .write_to(&mut out, image::ImageFormat::Png)
                .map_err(EnhanceError::ImageEncode)?;
            out.into_inner()
        };

        let path = dir.as_ref().join(DOWNLOAD_FILE_NAME);
        std::fs::write(&path, png)?;
        Ok(path)
    }

    /// Drops the image and result.
    pub fn reset(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.image.take().is_some() {
            tracing::debug!("released previous image");
        }
        self.result = None;
        self.processing = false;
    }

    /// Error kind of the last result, if it failed.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.result.as_ref().and_then(EnhancementResult::error_kind)
    }
}

/// Holds the pending flag for the lifetime of one request. Clears it on
/// drop, including when the enhance future is dropped mid-flight.
struct Pending<'a>(&'a mut bool);

impl<'a> Pending<'a> {
    fn start(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}
