//! Central error classification.
//!
//! Every failure that can reach a user passes through here exactly once:
//! upstream errors inside the proxy, structured error bodies inside the
//! client, and local decode failures. Callers only ever display the
//! message produced by [`user_message`].

use serde::{Deserialize, Serialize};

/// Client-visible failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rate limit or quota exhausted upstream.
    QuotaExceeded,
    /// The model's safety system rejected the request.
    SafetyBlocked,
    /// The server credential was rejected by the upstream model.
    InvalidCredential,
    /// The model answered with text instead of an image.
    ModelRefusal,
    /// The model answered with neither text nor an image.
    NoImageReturned,
    /// The local image could not be decoded.
    DecodeError,
    /// Transport failure or an unreadable response.
    NetworkError,
    /// The request was malformed or incomplete.
    InvalidRequest,
    /// The server has no credential configured.
    Configuration,
    /// The request was abandoned before it completed.
    Cancelled,
    /// Anything else.
    Unclassified,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::SafetyBlocked => "safety_blocked",
            Self::InvalidCredential => "invalid_credential",
            Self::ModelRefusal => "model_refusal",
            Self::NoImageReturned => "no_image_returned",
            Self::DecodeError => "decode_error",
            Self::NetworkError => "network_error",
            Self::InvalidRequest => "invalid_request",
            Self::Configuration => "configuration",
            Self::Cancelled => "cancelled",
            Self::Unclassified => "unclassified",
        }
    }

    /// HTTP status the proxy uses when reporting this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest | Self::DecodeError => 400,
            Self::QuotaExceeded => 429,
            Self::SafetyBlocked | Self::ModelRefusal => 422,
            Self::NetworkError => 502,
            Self::InvalidCredential
            | Self::Configuration
            | Self::NoImageReturned
            | Self::Cancelled
            | Self::Unclassified => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix that distinguishes model refusals from hard failures.
pub const REFUSAL_PREFIX: &str = "The AI model responded: ";

const QUOTA_MARKERS: &[&str] = &[
    "429",
    "quota",
    "resource_exhausted",
    "rate limit",
    "too many requests",
];
const SAFETY_MARKERS: &[&str] = &["safety", "blocked", "prohibited", "content_policy"];
const CREDENTIAL_MARKERS: &[&str] = &[
    "api key",
    "api_key_invalid",
    "permission_denied",
    "unauthenticated",
];
const NO_IMAGE_MARKERS: &[&str] = &["no output image", "no image", "did not return an image"];

/// Classifies a raw upstream message, optionally with its HTTP status.
///
/// `ModelRefusal` and `DecodeError` are never produced here; they only
/// arise structurally.
pub fn classify_message(status: Option<u16>, raw: &str) -> ErrorKind {
    let lower = raw.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if status == Some(429) || contains_any(QUOTA_MARKERS) {
        return ErrorKind::QuotaExceeded;
    }
    if contains_any(SAFETY_MARKERS) {
        return ErrorKind::SafetyBlocked;
    }
    if matches!(status, Some(401) | Some(403)) || contains_any(CREDENTIAL_MARKERS) {
        return ErrorKind::InvalidCredential;
    }
    if contains_any(NO_IMAGE_MARKERS) {
        return ErrorKind::NoImageReturned;
    }
    ErrorKind::Unclassified
}

/// Returns the short human-readable message for `kind`.
///
/// `detail` is the model text for refusals and the raw upstream text for
/// unclassified failures; other kinds ignore it.
pub fn user_message(kind: ErrorKind, detail: &str) -> String {
    match kind {
        ErrorKind::QuotaExceeded => {
            "Usage limit reached. Please wait a moment and try again later.".into()
        }
        ErrorKind::SafetyBlocked => {
            "The image was blocked by the AI safety filter. Please try a different image.".into()
        }
        ErrorKind::InvalidCredential => {
            "The server's API key is invalid. Please contact the site administrator.".into()
        }
        ErrorKind::Configuration => {
            "The server is missing its API key configuration. Please contact the site administrator."
                .into()
        }
        ErrorKind::ModelRefusal => {
            let text = detail.trim();
            if text.is_empty() {
                user_message(ErrorKind::NoImageReturned, "")
            } else {
                format!("{REFUSAL_PREFIX}{text}")
            }
        }
        ErrorKind::NoImageReturned => {
            "The AI model did not return an image. Please try a different prompt or image.".into()
        }
        ErrorKind::DecodeError => "Invalid image file. The image could not be decoded.".into(),
        ErrorKind::NetworkError => {
            "Could not reach the enhancement service. Please check your connection and try again."
                .into()
        }
        ErrorKind::InvalidRequest => {
            let text = detail.trim();
            if text.is_empty() {
                "The request was invalid.".into()
            } else {
                format!("Invalid request: {text}")
            }
        }
        ErrorKind::Cancelled => "The request was cancelled.".into(),
        ErrorKind::Unclassified => match extract_embedded_message(detail) {
            Some(message) => format!("Enhancement failed: {message}"),
            None => "An unexpected error occurred. Please try again.".into(),
        },
    }
}

/// Pulls a message out of a JSON error object embedded in `raw`.
///
/// Handles `{"error":{"message":..}}`, `{"error":".."}` and `{"message":..}`,
/// with arbitrary text before the opening brace (e.g. `"400 Bad Request {..}"`).
pub fn extract_embedded_message(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&raw[start..=end]).ok()?;

    let message = match value.get("error") {
        Some(serde_json::Value::Object(inner)) => inner.get("message").and_then(|m| m.as_str()),
        Some(serde_json::Value::String(s)) => Some(s.as_str()),
        _ => value.get("message").and_then(|m| m.as_str()),
    }?;

    let message = message.trim();
    if message.is_empty() {
        None
    } else {
        Some(sanitize_error_message(message))
    }
}

/// Maximum length of upstream text carried in logs or error bodies.
const MAX_ERROR_LEN: usize = 300;

/// Collapses whitespace and truncates upstream error text.
pub fn sanitize_error_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_LEN {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MAX_ERROR_LEN).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_takes_priority() {
        assert_eq!(
            classify_message(None, "429 RESOURCE_EXHAUSTED"),
            ErrorKind::QuotaExceeded
        );
        // Mentions safety too, but quota wins.
        assert_eq!(
            classify_message(None, "quota exceeded; safety settings unchanged"),
            ErrorKind::QuotaExceeded
        );
        assert_eq!(classify_message(Some(429), "slow down"), ErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_safety_and_credential() {
        assert_eq!(
            classify_message(None, "Request blocked by SAFETY filter"),
            ErrorKind::SafetyBlocked
        );
        assert_eq!(
            classify_message(Some(400), "API key not valid. Please pass a valid API key."),
            ErrorKind::InvalidCredential
        );
        assert_eq!(
            classify_message(Some(403), "forbidden"),
            ErrorKind::InvalidCredential
        );
    }

    #[test]
    fn test_no_image_and_fallback() {
        assert_eq!(
            classify_message(None, "No output image returned."),
            ErrorKind::NoImageReturned
        );
        assert_eq!(classify_message(Some(500), "internal"), ErrorKind::Unclassified);
    }

    #[test]
    fn test_refusal_message_is_prefixed() {
        let msg = user_message(ErrorKind::ModelRefusal, "  I can't edit photos of people.  ");
        assert_eq!(msg, "The AI model responded: I can't edit photos of people.");
    }

    #[test]
    fn test_empty_refusal_degrades_to_no_image() {
        assert_eq!(
            user_message(ErrorKind::ModelRefusal, " "),
            user_message(ErrorKind::NoImageReturned, "")
        );
    }

    #[test]
    fn test_unclassified_extracts_embedded_error() {
        let raw = r#"got status 500 {"error":{"code":500,"message":"Internal error encountered.","status":"INTERNAL"}}"#;
        assert_eq!(
            user_message(ErrorKind::Unclassified, raw),
            "Enhancement failed: Internal error encountered."
        );
        assert_eq!(
            user_message(ErrorKind::Unclassified, "{not json"),
            "An unexpected error occurred. Please try again."
        );
    }

    #[test]
    fn test_extract_flat_error_string() {
        assert_eq!(
            extract_embedded_message(r#"{"error":"boom"}"#).as_deref(),
            Some("boom")
        );
        assert_eq!(extract_embedded_message(r#"{"message":"  "}"#), None);
    }

    #[test]
    fn test_sanitize_truncates_and_collapses() {
        assert_eq!(sanitize_error_message("a\n  b\tc"), "a b c");
        let long = "x".repeat(1000);
        let out = sanitize_error_message(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), MAX_ERROR_LEN + 3);
    }

    #[test]
    fn test_kind_serde_is_snake_case() {
        let json = serde_json::to_string(&ErrorKind::QuotaExceeded).unwrap();
        assert_eq!(json, "\"quota_exceeded\"");
        let kind: ErrorKind = serde_json::from_str("\"model_refusal\"").unwrap();
        assert_eq!(kind, ErrorKind::ModelRefusal);
        assert_eq!(ErrorKind::ModelRefusal.to_string(), "model_refusal");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorKind::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorKind::Configuration.http_status(), 500);
        assert_eq!(ErrorKind::QuotaExceeded.http_status(), 429);
        assert_eq!(ErrorKind::Unclassified.http_status(), 500);
    }
}
