//! Enhancement styles and the instruction text sent to the model.

use serde::{Deserialize, Serialize};

/// Instruction used for a blank custom prompt.
pub const DEFAULT_CUSTOM_PROMPT: &str = "Enhance this image.";

/// Instruction used for an unrecognized style label.
pub const FALLBACK_PROMPT: &str = "Make this image high quality.";

const HIGH_QUALITY_RESTORE_PROMPT: &str = "Create a high-quality, high-resolution version of this image. Improve sharpness, lighting, and details while maintaining the original composition and subject identity exactly. Photorealistic 8K output.";

const CREATIVE_UPSCALE_PROMPT: &str = "Re-imagine this image in ultra-high definition. Add intricate details, dramatic lighting, and rich textures. Cinematic 8K quality.";

const PORTRAIT_ENHANCE_PROMPT: &str = "Enhance the subject's face, skin texture, and lighting. Improve sharpness and clarity. KEEP the background unchanged and preserve identity.";

/// Enhancement styles offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnhancementStyle {
    /// Sharpen and relight while keeping the composition intact.
    #[default]
    HighQualityRestore,
    /// Reimagine the image with added detail.
    CreativeUpscale,
    /// Face and skin work, background untouched.
    PortraitEnhance,
    /// User-supplied instruction.
    CustomPrompt,
}

impl EnhancementStyle {
    /// All styles, in display order.
    pub const ALL: [EnhancementStyle; 4] = [
        Self::HighQualityRestore,
        Self::CreativeUpscale,
        Self::PortraitEnhance,
        Self::CustomPrompt,
    ];

    /// Returns the display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HighQualityRestore => "High Quality Restore",
            Self::CreativeUpscale => "Creative Upscale",
            Self::PortraitEnhance => "Portrait Enhance",
            Self::CustomPrompt => "Custom Prompt",
        }
    }

    /// Returns the kebab-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighQualityRestore => "high-quality-restore",
            Self::CreativeUpscale => "creative-upscale",
            Self::PortraitEnhance => "portrait-enhance",
            Self::CustomPrompt => "custom-prompt",
        }
    }

    /// Parses a display label or kebab-case identifier.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label) || s.as_str() == label)
    }
}

impl std::fmt::Display for EnhancementStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the instruction text for `style`.
///
/// `custom` is only consulted for [`EnhancementStyle::CustomPrompt`]; it is
/// echoed verbatim unless blank.
pub fn resolve_prompt(style: EnhancementStyle, custom: Option<&str>) -> String {
    match style {
        EnhancementStyle::HighQualityRestore => HIGH_QUALITY_RESTORE_PROMPT.to_string(),
        EnhancementStyle::CreativeUpscale => CREATIVE_UPSCALE_PROMPT.to_string(),
        EnhancementStyle::PortraitEnhance => PORTRAIT_ENHANCE_PROMPT.to_string(),
        EnhancementStyle::CustomPrompt => match custom {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => DEFAULT_CUSTOM_PROMPT.to_string(),
        },
    }
}

/// Like [`resolve_prompt`], but from a free-form label. Unknown labels get
/// [`FALLBACK_PROMPT`].
pub fn resolve_prompt_label(label: &str, custom: Option<&str>) -> String {
    match EnhancementStyle::from_label(label) {
        Some(style) => resolve_prompt(style, custom),
        None => FALLBACK_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_styles_ignore_custom_text() {
        let a = resolve_prompt(EnhancementStyle::HighQualityRestore, None);
        let b = resolve_prompt(EnhancementStyle::HighQualityRestore, Some("make it purple"));
        assert_eq!(a, b);
        assert!(a.contains("subject identity exactly"));
    }

    #[test]
    fn test_custom_prompt_verbatim_and_fallback() {
        assert_eq!(
            resolve_prompt(EnhancementStyle::CustomPrompt, Some("  add a sunset ")),
            "  add a sunset "
        );
        assert_eq!(
            resolve_prompt(EnhancementStyle::CustomPrompt, Some("")),
            DEFAULT_CUSTOM_PROMPT
        );
        assert_eq!(
            resolve_prompt(EnhancementStyle::CustomPrompt, Some(" \n\t")),
            DEFAULT_CUSTOM_PROMPT
        );
        assert_eq!(
            resolve_prompt(EnhancementStyle::CustomPrompt, None),
            DEFAULT_CUSTOM_PROMPT
        );
    }

    #[test]
    fn test_portrait_preserves_background() {
        let prompt = resolve_prompt(EnhancementStyle::PortraitEnhance, None);
        assert!(prompt.contains("KEEP the background unchanged"));
        assert!(prompt.contains("preserve identity"));
    }

    #[test]
    fn test_creative_upscale() {
        let prompt = resolve_prompt(EnhancementStyle::CreativeUpscale, None);
        assert!(prompt.contains("ultra-high definition"));
        assert!(prompt.contains("Cinematic"));
    }

    #[test]
    fn test_labels_parse() {
        assert_eq!(
            EnhancementStyle::from_label("Portrait Enhance"),
            Some(EnhancementStyle::PortraitEnhance)
        );
        assert_eq!(
            EnhancementStyle::from_label("creative-upscale"),
            Some(EnhancementStyle::CreativeUpscale)
        );
        assert_eq!(EnhancementStyle::from_label("Sepia"), None);
    }

    #[test]
    fn test_unknown_label_falls_back() {
        assert_eq!(resolve_prompt_label("Sepia", Some("x")), FALLBACK_PROMPT);
        assert_eq!(resolve_prompt_label("Custom Prompt", Some("x")), "x");
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&EnhancementStyle::PortraitEnhance).unwrap();
        assert_eq!(json, "\"portrait-enhance\"");
    }
}
