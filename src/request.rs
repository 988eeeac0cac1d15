//! Wire types shared by the client and the proxy.

use crate::classify::ErrorKind;
use crate::image::NormalizedImage;
use serde::{Deserialize, Deserializer, Serialize};

/// A single enhancement request: image payload plus instruction.
///
/// Serializes as `{ "base64Image", "mimeType", "prompt" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementRequest {
    /// Base64-encoded image bytes.
    #[serde(rename = "base64Image")]
    pub encoded_image: String,
    /// Media type of the encoded image.
    #[serde(rename = "mimeType")]
    pub media_type: String,
    /// Instruction text for the model.
    #[serde(rename = "prompt")]
    pub instruction: String,
}

impl EnhancementRequest {
    /// Creates a request from raw parts.
    pub fn new(
        encoded_image: impl Into<String>,
        media_type: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            encoded_image: encoded_image.into(),
            media_type: media_type.into(),
            instruction: instruction.into(),
        }
    }

    /// Creates a request for a normalized image.
    pub fn from_normalized(image: &NormalizedImage, instruction: impl Into<String>) -> Self {
        Self::new(image.to_base64(), image.media_type(), instruction)
    }
}

/// Response body returned by the proxy.
///
/// Success carries `image`; failure carries `error` and, from this proxy,
/// `kind`. An unrecognized `kind` deserializes as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceResponseBody {
    /// Base64 result image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Human-readable error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error classification.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "known_kind"
    )]
    pub kind: Option<ErrorKind>,
}

fn known_kind<'de, D>(deserializer: D) -> Result<Option<ErrorKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

impl EnhanceResponseBody {
    /// A success body.
    pub fn image(data: impl Into<String>) -> Self {
        Self {
            image: Some(data.into()),
            ..Self::default()
        }
    }

    /// A failure body.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            kind: Some(kind),
            ..Self::default()
        }
    }
}

/// Outcome of one enhancement attempt. Terminal; never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum EnhancementResult {
    /// The model returned an image.
    Success {
        /// Base64 image data, unmodified from the backend.
        encoded_image: String,
    },
    /// The attempt failed.
    Failure {
        /// Failure class.
        kind: ErrorKind,
        /// Message suitable for display.
        message: String,
    },
}

impl EnhancementResult {
    /// Builds a failure from a kind and display message.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Returns true for [`EnhancementResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
