//! Canonical post model shared by every extraction strategy.

use serde::{Deserialize, Serialize};

/// Untyped document tree read from the page during a single probe.
///
/// `serde_json::Value` is already a tagged object/array/scalar tree, so the
/// matcher and normalizer work on it directly.
pub type RawDocument = serde_json::Value;

/// Caption shown when a post has no (or a blank) caption.
pub const NO_CAPTION: &str = "(no caption)";

/// Author name shown when the post carries no username.
pub const UNKNOWN_AUTHOR: &str = "unknown author";

/// Normalized, schema-independent representation of one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPost {
    /// Caption text as published. `None` when the post has no caption at all;
    /// an empty caption stays `Some("")`.
    pub caption: Option<String>,
    pub author: Author,
    pub post_type: PostType,
    /// Downloadable media in source (carousel) order.
    pub media: Vec<MediaItem>,
}

impl CanonicalPost {
    /// Caption for display, falling back to [`NO_CAPTION`].
    pub fn caption_or_default(&self) -> &str {
        match self.caption.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => NO_CAPTION,
        }
    }

    /// Whether there is anything to download.
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }
}

/// Post author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl Author {
    /// Username for display, falling back to [`UNKNOWN_AUTHOR`].
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(UNKNOWN_AUTHOR)
    }
}

/// What kind of post was found.
///
/// `Video` iff at least one media item resolved; `Image` when nothing
/// resolved but an image structure was present; `Unknown` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Video,
    Image,
    Unknown,
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One downloadable media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Never empty.
    pub source_url: String,
    pub thumbnail_url: Option<String>,
    /// Playback length in seconds, always finite and `>= 0` when present.
    pub duration_seconds: Option<f64>,
}

/// Errors raised while turning a matched node into a [`CanonicalPost`].
#[derive(thiserror::Error, Debug)]
pub enum NormalizationError {
    /// The node matched the spec but does not decode into any known post shape.
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

/// Convenience result type.
pub type NormalizationResult<T> = Result<T, NormalizationError>;
