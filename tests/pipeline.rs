//! End-to-end: session -> client -> proxy -> fake Gemini upstream.
#![cfg(feature = "server")]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use photoenhance::{
    EnhanceClient, EnhancementResult, EnhancementStyle, ErrorKind, ServerConfig, Session,
};
use serde_json::{json, Value};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct Upstream {
    last: Arc<Mutex<Option<(Option<String>, Value)>>>,
    image_b64: String,
}

async fn generate_content(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let prompt = body["contents"][0]["parts"][1]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    *upstream.last.lock().unwrap() = Some((key, body));

    if prompt.contains("QUOTA") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {
                "code": 429,
                "message": "Resource has been exhausted (e.g. check quota).",
                "status": "RESOURCE_EXHAUSTED"
            }})),
        );
    }
    if prompt.contains("REFUSE") {
        return (
            StatusCode::OK,
            Json(json!({"candidates": [{
                "content": {"parts": [{"text": "I can't edit this image."}]},
                "finishReason": "STOP"
            }]})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"candidates": [{
            "content": {"parts": [
                {"text": "Here is the enhanced image."},
                {"inlineData": {"mimeType": "image/png", "data": upstream.image_b64}}
            ]},
            "finishReason": "STOP"
        }]})),
    )
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

struct Harness {
    upstream: Upstream,
    client: EnhanceClient,
}

async fn start(api_key: Option<&str>) -> Harness {
    let result_png = encode(&DynamicImage::new_rgb8(4, 4), ImageFormat::Png);
    let upstream = Upstream {
        last: Arc::new(Mutex::new(None)),
        image_b64: base64::engine::general_purpose::STANDARD.encode(result_png),
    };
    let upstream_addr = spawn(
        Router::new()
            .route("/v1beta/models/:call", post(generate_content))
            .with_state(upstream.clone()),
    )
    .await;

    let config = ServerConfig {
        api_key: api_key.map(String::from),
        upstream_url: format!("http://{upstream_addr}"),
        ..ServerConfig::default()
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        photoenhance::server::serve_on(listener, config, std::future::pending())
            .await
            .unwrap();
    });

    let client = EnhanceClient::builder()
        .endpoint(format!("http://{proxy_addr}/api/enhance"))
        .build()
        .unwrap();

    Harness { upstream, client }
}

#[tokio::test]
async fn test_large_png_portrait_end_to_end() {
    let harness = start(Some("test-key")).await;
    let dir = tempfile::tempdir().unwrap();

    let mut session = Session::new();
    let png = encode(&DynamicImage::new_rgb8(4000, 2000), ImageFormat::Png);
    let image = session.load(png, Some("image/png"), Some("wide.png")).unwrap();
    assert_eq!((image.width(), image.height()), (2048, 1024));
    assert_eq!(image.media_type(), "image/jpeg");

    let result = session
        .enhance(&harness.client, EnhancementStyle::PortraitEnhance, None)
        .await
        .cloned()
        .unwrap();
    match &result {
        EnhancementResult::Success { encoded_image } => {
            assert_eq!(encoded_image, &harness.upstream.image_b64);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let (key, body) = harness.upstream.last.lock().unwrap().clone().unwrap();
    assert_eq!(key.as_deref(), Some("test-key"));
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
    assert!(parts[1]["text"]
        .as_str()
        .unwrap()
        .contains("KEEP the background unchanged"));
    assert_eq!(
        body["generationConfig"]["responseModalities"],
        json!(["IMAGE"])
    );

    let sent = base64::engine::general_purpose::STANDARD
        .decode(parts[0]["inlineData"]["data"].as_str().unwrap())
        .unwrap();
    let sent = image::load_from_memory(&sent).unwrap();
    assert_eq!((sent.width(), sent.height()), (2048, 1024));

    let path = session.download(dir.path()).unwrap();
    assert!(path.ends_with("enhanced_image.png"));
    assert!(std::fs::read(path).unwrap().starts_with(&[0x89, b'P', b'N', b'G']));
}

#[tokio::test]
async fn test_text_only_answer_is_refusal() {
    let harness = start(Some("test-key")).await;

    let mut session = Session::new();
    let png = encode(&DynamicImage::new_rgb8(64, 64), ImageFormat::Png);
    session.load(png, None, None).unwrap();

    let result = session
        .enhance(
            &harness.client,
            EnhancementStyle::CustomPrompt,
            Some("REFUSE this one"),
        )
        .await
        .cloned()
        .unwrap();
    assert_eq!(
        result,
        EnhancementResult::failure(
            ErrorKind::ModelRefusal,
            "The AI model responded: I can't edit this image."
        )
    );
}

#[tokio::test]
async fn test_upstream_quota_is_classified() {
    let harness = start(Some("test-key")).await;

    let mut session = Session::new();
    let png = encode(&DynamicImage::new_rgb8(64, 64), ImageFormat::Png);
    session.load(png, None, None).unwrap();

    let result = session
        .enhance(&harness.client, EnhancementStyle::CustomPrompt, Some("QUOTA"))
        .await
        .cloned()
        .unwrap();
    match result {
        EnhancementResult::Failure { kind, message } => {
            assert_eq!(kind, ErrorKind::QuotaExceeded);
            assert!(!message.contains("RESOURCE_EXHAUSTED"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!session.is_processing());
}

#[tokio::test]
async fn test_missing_credential_never_reaches_upstream() {
    let harness = start(None).await;

    let mut session = Session::new();
    let png = encode(&DynamicImage::new_rgb8(16, 16), ImageFormat::Png);
    session.load(png, None, None).unwrap();

    let result = session
        .enhance(&harness.client, EnhancementStyle::HighQualityRestore, None)
        .await
        .cloned()
        .unwrap();
    assert_eq!(result.error_kind(), Some(ErrorKind::Configuration));
    assert!(harness.upstream.last.lock().unwrap().is_none());
}
