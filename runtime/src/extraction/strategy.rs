// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Ways of reading post data out of a live page.
//!
//! Both strategies feed the same matcher/normalizer path: the embedded-JSON
//! strategy hands over raw data blocks, the rendered-DOM strategy builds a
//! post-shaped document from the elements currently on screen.

use crate::renderer::RenderContext;
use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use threadgrab::{MatchSpec, RawDocument};

/// Script blocks carrying server-side data on post pages.
pub const EMBEDDED_DATA_SELECTOR: &str = r#"script[type="application/json"][data-sjs]"#;

/// Which strategy a job uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Search embedded JSON data blocks.
    EmbeddedJson,
    /// Read rendered `<video>` elements.
    RenderedDom,
}

impl StrategyKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "embedded-json" | "json" => Some(Self::EmbeddedJson),
            "rendered-dom" | "dom" => Some(Self::RenderedDom),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmbeddedJson => "embedded-json",
            Self::RenderedDom => "rendered-dom",
        }
    }
}

/// Strategy selected at job construction.
#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
    EmbeddedJson(EmbeddedJsonStrategy),
    RenderedDom(RenderedDomStrategy),
}

impl ExtractionStrategy {
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::EmbeddedJson => Self::EmbeddedJson(EmbeddedJsonStrategy::default()),
            StrategyKind::RenderedDom => Self::RenderedDom(RenderedDomStrategy),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::EmbeddedJson(_) => StrategyKind::EmbeddedJson,
            Self::RenderedDom(_) => StrategyKind::RenderedDom,
        }
    }
}

/// Reads `<script type="application/json">` blocks from the page.
#[derive(Debug, Clone)]
pub struct EmbeddedJsonStrategy {
    pub selector: String,
}

impl Default for EmbeddedJsonStrategy {
    fn default() -> Self {
        Self {
            selector: EMBEDDED_DATA_SELECTOR.to_string(),
        }
    }
}

impl EmbeddedJsonStrategy {
    /// Script returning the text of every matching block.
    pub fn script(&self) -> String {
        // JSON string literals are valid JS string literals.
        let selector = serde_json::to_string(&self.selector).unwrap_or_else(|_| "''".into());
        format!(
            "(() => Array.from(document.querySelectorAll({selector})).map(s => s.textContent || ''))()"
        )
    }

    /// Fetch the raw text of every embedded data block currently on the page.
    pub async fn read_blocks(&self, page: &dyn RenderContext) -> Result<Vec<String>> {
        let value = page
            .execute_js(&self.script())
            .await
            .context("failed to read embedded data blocks")?;
        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Reads post media from the rendered DOM.
///
/// Only videos the page has actually rendered are visible, so this strategy
/// never reports image-only posts.
#[derive(Debug, Clone, Default)]
pub struct RenderedDomStrategy;

impl RenderedDomStrategy {
    pub async fn read_html(&self, page: &dyn RenderContext) -> Result<String> {
        page.get_html().await.context("failed to read rendered HTML")
    }

    /// Cheap textual check before parsing the whole document.
    pub fn prefilter(html: &str, spec: &MatchSpec) -> bool {
        html.contains("<video")
            && spec
                .identity()
                .map_or(true, |identity| html.contains(identity.as_str()))
    }

    /// Build a post-shaped document from rendered markup.
    ///
    /// Returns `None` until an author link and at least one downloadable
    /// video are present.
    pub fn synthesize(html: &str) -> Option<RawDocument> {
        let document = Html::parse_document(html);
        let video_sel = Selector::parse("video").ok()?;
        let source_sel = Selector::parse("source[src]").ok()?;
        let author_sel = Selector::parse(r#"a[href^="/@"]"#).ok()?;
        let avatar_sel = Selector::parse(r#"img[alt*="profile picture"]"#).ok()?;
        let caption_sel = Selector::parse(r#"meta[property="og:description"]"#).ok()?;

        let username = document
            .select(&author_sel)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| href.strip_prefix("/@"))
            .map(|rest| rest.split(['/', '?']).next().unwrap_or_default())
            .find(|name| !name.is_empty())?
            .to_string();

        let mut seen = std::collections::HashSet::new();
        let items: Vec<Value> = document
            .select(&video_sel)
            .filter_map(|video| {
                let src = video_source(&video, &source_sel)?;
                if !seen.insert(src.clone()) {
                    return None;
                }
                let poster = video.value().attr("poster").filter(|p| !p.is_empty());
                Some(json!({
                    "video_versions": [{ "url": src }],
                    "image_versions2": { "candidates": poster.map(|p| vec![json!({ "url": p })]).unwrap_or_default() },
                }))
            })
            .collect();

        if items.is_empty() {
            return None;
        }

        let avatar = document
            .select(&avatar_sel)
            .find_map(|img| img.value().attr("src"))
            .map(str::to_string);
        let caption = document
            .select(&caption_sel)
            .find_map(|m| m.value().attr("content"))
            .map(|text| json!({ "text": text }))
            .unwrap_or(Value::Null);

        Some(json!({
            "pk": "rendered-dom",
            "user": { "username": username, "profile_pic_url": avatar },
            "caption": caption,
            "carousel_media": items,
        }))
    }
}

fn video_source(video: &ElementRef<'_>, source_sel: &Selector) -> Option<String> {
    video
        .value()
        .attr("src")
        .or_else(|| {
            video
                .select(source_sel)
                .find_map(|s| s.value().attr("src"))
        })
        .filter(|src| !src.is_empty() && !src.starts_with("blob:"))
        .map(str::to_string)
}
