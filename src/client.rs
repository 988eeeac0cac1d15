//! Client for the enhancement proxy.

use crate::classify::{classify_message, sanitize_error_message, user_message, ErrorKind};
use crate::error::Result;
use crate::request::{EnhanceResponseBody, EnhancementRequest, EnhancementResult};
use std::future::Future;
use std::time::Duration;

/// Default proxy endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/enhance";

/// Default request timeout; generation can be slow.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(180);

/// Builder for EnhanceClient.
#[derive(Debug, Clone, Default)]
pub struct EnhanceClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl EnhanceClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the proxy endpoint URL.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<EnhanceClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_CLIENT_TIMEOUT))
            .build()?;
        Ok(EnhanceClient {
            http,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }
}

/// Sends enhancement requests to the proxy and classifies the outcome.
#[derive(Debug, Clone)]
pub struct EnhanceClient {
    http: reqwest::Client,
    endpoint: String,
}

impl EnhanceClient {
    /// Creates a new `EnhanceClientBuilder`.
    pub fn builder() -> EnhanceClientBuilder {
        EnhanceClientBuilder::new()
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends exactly one request. Never retries.
    pub async fn submit(&self, request: &EnhancementRequest) -> EnhancementResult {
        let response = match self.http.post(&self.endpoint).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, "enhancement request failed: {e}");
                return network_failure();
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(status = status.as_u16(), "failed to read response body: {e}");
                return network_failure();
            }
        };

        interpret_response(status.as_u16(), &text)
    }

    /// Like [`submit`](Self::submit), but abandons the request once `cancel`
    /// resolves.
    pub async fn submit_until<F>(
        &self,
        request: &EnhancementRequest,
        cancel: F,
    ) -> EnhancementResult
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => {
                tracing::debug!(endpoint = %self.endpoint, "enhancement request cancelled");
                EnhancementResult::failure(
                    ErrorKind::Cancelled,
                    user_message(ErrorKind::Cancelled, ""),
                )
            }
            result = self.submit(request) => result,
        }
    }
}

fn network_failure() -> EnhancementResult {
    EnhancementResult::failure(
        ErrorKind::NetworkError,
        user_message(ErrorKind::NetworkError, ""),
    )
}

/// Maps a proxy response to a result.
///
/// A recognized `kind` means the proxy already formatted `error` for
/// display. Any other error string goes through the classifier, so nothing
/// raw reaches the caller.
pub fn interpret_response(status: u16, text: &str) -> EnhancementResult {
    let success = (200..300).contains(&status);
    let body = serde_json::from_str::<EnhanceResponseBody>(text).ok();

    match body {
        Some(EnhanceResponseBody {
            error: Some(error),
            kind: Some(kind),
            ..
        }) => {
            tracing::debug!(status, kind = %kind, "backend reported error");
            if error.trim().is_empty() {
                EnhancementResult::failure(kind, user_message(kind, ""))
            } else {
                EnhancementResult::failure(kind, error)
            }
        }
        Some(EnhanceResponseBody {
            error: Some(error), ..
        }) => {
            let kind = classify_message((!success).then_some(status), &error);
            tracing::debug!(
                status,
                kind = %kind,
                "backend reported error: {}",
                sanitize_error_message(&error)
            );
            EnhancementResult::failure(kind, user_message(kind, &error))
        }
        Some(EnhanceResponseBody {
            image: Some(image), ..
        }) if success && !image.is_empty() => EnhancementResult::Success {
            encoded_image: image,
        },
        Some(_) if success => EnhancementResult::failure(
            ErrorKind::NoImageReturned,
            user_message(ErrorKind::NoImageReturned, ""),
        ),
        _ if success => EnhancementResult::failure(
            ErrorKind::NetworkError,
            "Received an unreadable response from the enhancement service.",
        ),
        _ => {
            tracing::debug!(status, "backend returned non-2xx without an error body");
            EnhancementResult::failure(
                ErrorKind::NetworkError,
                format!("The enhancement service returned HTTP {status}. Please try again."),
            )
        }
    }
}
