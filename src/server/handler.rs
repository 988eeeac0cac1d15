//! `POST /api/enhance` handler.

use crate::error::EnhanceError;
use crate::request::{EnhanceResponseBody, EnhancementRequest};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};

/// Inbound body. Fields are optional so a missing one is a validation
/// error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct EnhancePayload {
    #[serde(rename = "base64Image", default)]
    base64_image: Option<String>,
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

/// Handles one enhancement request with exactly one upstream call.
///
/// Pipeline:
/// 1. Parse the JSON body (400/413 on failure)
/// 2. Validate the three fields (400)
/// 3. Require a configured editor (500, no upstream call)
/// 4. Forward to the editor and relay the first image
pub(crate) async fn enhance(
    State(state): State<AppState>,
    payload: Result<Json<EnhancePayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejection_response(&rejection),
    };

    let request = match validate(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!("rejected enhancement request: {e}");
            return error_response(&e);
        }
    };

    let Some(editor) = state.editor.as_ref() else {
        warn!("enhancement requested but no API key is configured");
        return error_response(&EnhanceError::Config("API Key missing on server.".into()));
    };

    debug!(
        editor = editor.name(),
        mime_type = %request.media_type,
        prompt_len = request.instruction.len(),
        "forwarding enhancement request"
    );

    match editor.edit(&request).await {
        Ok(image) => {
            debug!(
                mime_type = %image.mime_type,
                duration_ms = ?image.duration_ms,
                "enhancement succeeded"
            );
            (StatusCode::OK, Json(EnhanceResponseBody::image(image.data))).into_response()
        }
        Err(e) => {
            warn!(kind = %e.kind(), "enhancement failed: {e}");
            error_response(&e)
        }
    }
}

/// Any method other than POST on the enhance route.
pub(crate) async fn method_not_allowed() -> Response {
    let body = EnhanceResponseBody::error(
        crate::classify::ErrorKind::InvalidRequest,
        "Method not allowed",
    );
    (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response()
}

/// Checks required fields and normalizes the base64 payload.
pub(crate) fn validate(payload: EnhancePayload) -> Result<EnhancementRequest, EnhanceError> {
    let present = |field: Option<String>| field.filter(|v| !v.trim().is_empty());

    let (Some(image), Some(mime_type), Some(prompt)) = (
        present(payload.base64_image),
        present(payload.mime_type),
        present(payload.prompt),
    ) else {
        return Err(EnhanceError::InvalidRequest("Missing required fields".into()));
    };

    let mime_type = mime_type.trim().to_lowercase();
    if !mime_type.starts_with("image/") {
        return Err(EnhanceError::InvalidRequest(format!(
            "mimeType must be an image type, got {mime_type}"
        )));
    }

    let bytes = decode_base64_lenient(&image)
        .map_err(|_| EnhanceError::InvalidRequest("base64Image is not valid base64".into()))?;
    if bytes.is_empty() {
        return Err(EnhanceError::InvalidRequest("base64Image is empty".into()));
    }

    Ok(EnhancementRequest::new(
        base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type,
        prompt,
    ))
}

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Accepts a data URL prefix (`data:image/jpeg;base64,`), missing padding,
/// and embedded whitespace.
fn decode_base64_lenient(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}

/// Structured failure body. `error` is always the display message for the
/// kind; raw upstream text only reaches the log.
fn error_response(error: &EnhanceError) -> Response {
    let kind = error.kind();
    let status =
        StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match error {
        EnhanceError::InvalidRequest(reason) => reason.clone(),
        other => other.user_message(),
    };
    (status, Json(EnhanceResponseBody::error(kind, message))).into_response()
}

fn rejection_response(rejection: &JsonRejection) -> Response {
    let status = rejection.status();
    warn!(status = status.as_u16(), "rejected request body: {}", rejection.body_text());
    let (status, message) = if status == StatusCode::PAYLOAD_TOO_LARGE {
        (status, "Request body is too large")
    } else {
        (
            StatusCode::BAD_REQUEST,
            "Request body must be JSON with base64Image, mimeType and prompt",
        )
    };
    let body = EnhanceResponseBody::error(crate::classify::ErrorKind::InvalidRequest, message);
    (status, Json(body)).into_response()
}
