//! Turn a matched post node into a [`CanonicalPost`].
//!
//! Three raw shapes are recognised:
//!
//! 1. single video: `video_versions` (first URL) plus `image_versions2.candidates`
//!    (first candidate is the thumbnail)
//! 2. single image: `image_versions2` with no usable video list
//! 3. carousel: `carousel_media`, each element classified like (1)
//!
//! Carousel elements without video contribute nothing to `media`.

use crate::types::{
    Author, CanonicalPost, MediaItem, NormalizationError, NormalizationResult, PostType,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawPost {
    video_versions: Option<Vec<RawUrl>>,
    image_versions2: Option<RawImageVersions>,
    video_duration: Option<f64>,
    carousel_media: Option<Vec<RawCarouselItem>>,
    caption: Option<RawCaption>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawCarouselItem {
    video_versions: Option<Vec<RawUrl>>,
    image_versions2: Option<RawImageVersions>,
    video_duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawImageVersions {
    candidates: Option<Vec<RawUrl>>,
}

#[derive(Debug, Deserialize)]
struct RawUrl {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCaption {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    username: Option<String>,
    profile_pic_url: Option<String>,
}

/// Normalize a candidate node.
///
/// Returns [`NormalizationError::MalformedInput`] only when the node cannot be
/// decoded as a post at all. A post with nothing downloadable is a valid
/// `Image` or `Unknown` result.
pub fn normalize(candidate: &Value) -> NormalizationResult<CanonicalPost> {
    if !candidate.is_object() {
        return Err(NormalizationError::MalformedInput(format!(
            "expected a post object, found {}",
            kind_of(candidate)
        )));
    }
    let raw = RawPost::deserialize(candidate)
        .map_err(|e| NormalizationError::MalformedInput(e.to_string()))?;

    let carousel = raw.carousel_media.as_deref().unwrap_or_default();

    let mut media: Vec<MediaItem> = carousel
        .iter()
        .filter_map(|item| {
            video_item(
                item.video_versions.as_deref(),
                item.image_versions2.as_ref(),
                item.video_duration,
            )
        })
        .collect();

    if media.is_empty() {
        media.extend(video_item(
            raw.video_versions.as_deref(),
            raw.image_versions2.as_ref(),
            raw.video_duration,
        ));
    }

    let has_image = raw.image_versions2.is_some()
        || carousel.iter().any(|item| item.image_versions2.is_some());

    let post_type = if !media.is_empty() {
        PostType::Video
    } else if has_image {
        PostType::Image
    } else {
        PostType::Unknown
    };

    let author = raw
        .user
        .map(|u| Author {
            username: u.username,
            avatar_url: non_empty(u.profile_pic_url),
        })
        .unwrap_or_default();

    tracing::debug!(
        "normalized {} post: {} media item(s), {} carousel element(s)",
        post_type,
        media.len(),
        carousel.len()
    );

    Ok(CanonicalPost {
        caption: raw.caption.and_then(|c| c.text),
        author,
        post_type,
        media,
    })
}

/// Build a media item from a video list, or `None` if it has no usable first URL.
fn video_item(
    videos: Option<&[RawUrl]>,
    images: Option<&RawImageVersions>,
    duration: Option<f64>,
) -> Option<MediaItem> {
    let source_url = non_empty(videos?.first()?.url.clone())?;
    let thumbnail_url = images
        .and_then(|i| i.candidates.as_deref())
        .and_then(|c| c.first())
        .and_then(|c| non_empty(c.url.clone()));
    Some(MediaItem {
        source_url,
        thumbnail_url,
        duration_seconds: duration.filter(|d| d.is_finite() && *d >= 0.0),
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
