//! Upstream generative models.

mod editor;
mod gemini;

pub use editor::{EditedImage, ImageEditor};
pub use gemini::{GeminiEditor, GeminiEditorBuilder, GeminiModel, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
