//! Image editor trait: the seam between the proxy and the upstream model.

use crate::error::Result;
use crate::request::EnhancementRequest;
use async_trait::async_trait;

/// An edited image as returned by the upstream model.
#[derive(Debug, Clone)]
#[must_use = "edited image should be forwarded to the caller"]
pub struct EditedImage {
    /// Base64 image data, exactly as the model returned it.
    pub data: String,
    /// Media type reported by the model.
    pub mime_type: String,
    /// Model that produced the image.
    pub model: Option<String>,
    /// Upstream round-trip in milliseconds.
    pub duration_ms: Option<u64>,
}

/// Trait for generative models that edit an image from an instruction.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Sends one edit request upstream. Never retries.
    async fn edit(&self, request: &EnhancementRequest) -> Result<EditedImage>;

    /// Returns the name of this editor for logs.
    fn name(&self) -> &str;
}
