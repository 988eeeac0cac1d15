#![warn(missing_docs)]
//! photoenhance - AI photo enhancement pipeline.
//!
//! This crate takes a user photo, normalizes it into a size-bounded JPEG,
//! resolves an enhancement style into model instructions, and sends it
//! through a small backend proxy to a Gemini image model.
//!
//! # Quick Start - Client
//!
//! ```no_run
//! use photoenhance::{EnhanceClient, EnhancementResult, EnhancementStyle, Session};
//!
//! #[tokio::main]
//! async fn main() -> photoenhance::Result<()> {
//!     let client = EnhanceClient::builder()
//!         .endpoint("http://127.0.0.1:3000/api/enhance")
//!         .build()?;
//!
//!     let mut session = Session::new();
//!     session.load_file("photo.jpg")?;
//!
//!     let outcome = session
//!         .enhance(&client, EnhancementStyle::PortraitEnhance, None)
//!         .await
//!         .cloned();
//!     match outcome {
//!         Some(EnhancementResult::Success { .. }) => {
//!             session.download(".")?;
//!         }
//!         Some(EnhancementResult::Failure { message, .. }) => eprintln!("{message}"),
//!         None => {}
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Proxy
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> photoenhance::Result<()> {
//!     // Reads API_KEY / GOOGLE_API_KEY and PHOTOENHANCE_* variables.
//!     let config = photoenhance::ServerConfig::from_env()?;
//!     photoenhance::server::serve(config).await
//! }
//! ```
//!
//! # Features
//!
//! - `server`: the axum enhancement proxy
//! - `cli`: the `photoenhance` command-line tool

pub mod classify;
mod client;
mod config;
mod error;
pub mod image;
pub mod model;
pub mod prompt;
mod request;
mod session;

#[cfg(feature = "server")]
pub mod server;

// Re-export error types at crate root
pub use classify::ErrorKind;
pub use error::{EnhanceError, Result};

pub use client::{interpret_response, EnhanceClient, EnhanceClientBuilder, DEFAULT_ENDPOINT};
pub use config::{ServerConfig, DEFAULT_BIND, DEFAULT_MAX_BODY_BYTES};
pub use crate::image::{normalize, normalize_bytes, NormalizedImage, SourceImage, MAX_DIMENSION};
pub use model::{GeminiEditor, GeminiModel, ImageEditor};
pub use prompt::{resolve_prompt, resolve_prompt_label, EnhancementStyle};
pub use request::{EnhanceResponseBody, EnhancementRequest, EnhancementResult};
pub use session::{Session, DOWNLOAD_FILE_NAME};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::classify::ErrorKind;
    pub use crate::client::EnhanceClient;
    pub use crate::error::{EnhanceError, Result};
    pub use crate::image::{normalize_bytes, NormalizedImage, SourceImage};
    pub use crate::prompt::{resolve_prompt, EnhancementStyle};
    pub use crate::request::{EnhancementRequest, EnhancementResult};
    pub use crate::session::Session;
}
