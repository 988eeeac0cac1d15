//! Error types for the enhancement pipeline.

use crate::classify::{classify_message, sanitize_error_message, user_message, ErrorKind};

/// Errors that can occur while normalizing or enhancing an image.
#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    /// Server credential missing or configuration invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status returned upstream.
        status: u16,
        /// Sanitized upstream error text.
        message: String,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The model answered with text instead of an image.
    #[error("model refused: {0}")]
    ModelRefusal(String),

    /// The model answered with neither text nor an image.
    #[error("no image returned: {0}")]
    NoImage(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The source image could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// The normalized image could not be encoded.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request was abandoned before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl EnhanceError {
    /// Builds an [`EnhanceError::Api`] with sanitized upstream text.
    pub fn api(status: u16, text: &str) -> Self {
        Self::Api {
            status,
            message: sanitize_error_message(text),
        }
    }

    /// Returns the client-visible class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Api { status, message } => classify_message(Some(*status), message),
            Self::ContentBlocked(_) => ErrorKind::SafetyBlocked,
            Self::ModelRefusal(_) => ErrorKind::ModelRefusal,
            Self::NoImage(_) => ErrorKind::NoImageReturned,
            Self::InvalidRequest(_) | Self::Decode(_) => ErrorKind::InvalidRequest,
            Self::ImageDecode(_) => ErrorKind::DecodeError,
            Self::Network(e) => match e.status() {
                Some(status) => classify_message(Some(status.as_u16()), &e.to_string()),
                None => ErrorKind::NetworkError,
            },
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ImageEncode(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Unclassified,
        }
    }

    /// Returns the raw detail behind this error, such as the refusal text or
    /// the sanitized upstream body.
    pub fn detail(&self) -> String {
        match self {
            Self::Config(text)
            | Self::ContentBlocked(text)
            | Self::ModelRefusal(text)
            | Self::NoImage(text)
            | Self::InvalidRequest(text)
            | Self::Decode(text) => text.clone(),
            Self::Api { message, .. } => message.clone(),
            other => sanitize_error_message(&other.to_string()),
        }
    }

    /// Returns the short message suitable for display.
    pub fn user_message(&self) -> String {
        user_message(self.kind(), &self.detail())
    }
}

/// Result type alias for enhancement operations.
pub type Result<T> = std::result::Result<T, EnhanceError>;
