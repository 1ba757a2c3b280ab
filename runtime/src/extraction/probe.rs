// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! A single poll cycle against the live page.

use super::strategy::{EmbeddedJsonStrategy, ExtractionStrategy, RenderedDomStrategy};
use crate::events::ProbeKind;
use crate::renderer::RenderContext;
use threadgrab::{locate, Located, MatchSpec, RawDocument};

/// What one probe saw.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The target node, detached from the block it was found in.
    Found(RawDocument),
    /// Nothing matching yet.
    NotYetAvailable,
    /// Data parsed, but it belongs to another post (stale navigation).
    Mismatch,
}

impl ProbeOutcome {
    pub fn kind(&self) -> ProbeKind {
        match self {
            Self::Found(_) => ProbeKind::Found,
            Self::NotYetAvailable => ProbeKind::NotYetAvailable,
            Self::Mismatch => ProbeKind::Mismatch,
        }
    }
}

/// Run one probe with `strategy`.
///
/// Page errors are logged and count as `NotYetAvailable`; the poll budget
/// decides when to give up.
pub async fn probe(
    page: &dyn RenderContext,
    strategy: &ExtractionStrategy,
    spec: &MatchSpec,
) -> ProbeOutcome {
    match strategy {
        ExtractionStrategy::EmbeddedJson(s) => probe_embedded(page, s, spec).await,
        ExtractionStrategy::RenderedDom(s) => probe_rendered(page, s, spec).await,
    }
}

async fn probe_embedded(
    page: &dyn RenderContext,
    strategy: &EmbeddedJsonStrategy,
    spec: &MatchSpec,
) -> ProbeOutcome {
    match strategy.read_blocks(page).await {
        Ok(blocks) => scan_blocks(&blocks, spec),
        Err(e) => {
            tracing::debug!("embedded probe failed: {e:#}");
            ProbeOutcome::NotYetAvailable
        }
    }
}

async fn probe_rendered(
    page: &dyn RenderContext,
    strategy: &RenderedDomStrategy,
    spec: &MatchSpec,
) -> ProbeOutcome {
    match strategy.read_html(page).await {
        Ok(html) => scan_html(&html, spec),
        Err(e) => {
            tracing::debug!("rendered-DOM probe failed: {e:#}");
            ProbeOutcome::NotYetAvailable
        }
    }
}

/// Classify rendered markup.
///
/// Only rendered, downloadable videos can yield `Found`; the author link
/// decides between `Found` and `Mismatch`.
pub fn scan_html(html: &str, spec: &MatchSpec) -> ProbeOutcome {
    if !RenderedDomStrategy::prefilter(html, spec) {
        return ProbeOutcome::NotYetAvailable;
    }
    match RenderedDomStrategy::synthesize(html) {
        Some(doc) => classify(&doc, spec),
        None => ProbeOutcome::NotYetAvailable,
    }
}

/// Scan raw data blocks in page order.
///
/// Blocks failing the textual pre-filter are never parsed. The first block
/// holding a full match wins; a mismatch is only reported if no block matched.
pub fn scan_blocks(blocks: &[String], spec: &MatchSpec) -> ProbeOutcome {
    let mut saw_mismatch = false;
    for block in blocks.iter().filter(|b| spec.prefilter(b)) {
        let doc: RawDocument = match serde_json::from_str(block) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("skipping unparseable data block: {e}");
                continue;
            }
        };
        match classify(&doc, spec) {
            ProbeOutcome::Found(node) => return ProbeOutcome::Found(node),
            ProbeOutcome::Mismatch => saw_mismatch = true,
            ProbeOutcome::NotYetAvailable => {}
        }
    }
    if saw_mismatch {
        ProbeOutcome::Mismatch
    } else {
        ProbeOutcome::NotYetAvailable
    }
}

/// Classify a parsed document against `spec`.
pub fn classify(doc: &RawDocument, spec: &MatchSpec) -> ProbeOutcome {
    match locate(doc, spec) {
        Located::Matched(node) => ProbeOutcome::Found(node.clone()),
        Located::IdentityMismatch(_) => ProbeOutcome::Mismatch,
        Located::Absent => ProbeOutcome::NotYetAvailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(username: &str, pk: &str) -> String {
        json!({
            "require": [["x", { "thread_items": [{ "post": {
                "pk": pk,
                "user": { "username": username },
                "caption": { "text": "hello" }
            }}]}]]
        })
        .to_string()
    }

    #[test]
    fn test_scan_finds_target_block() {
        let spec = MatchSpec::post_by("alice");
        let blocks = vec!["{}".to_string(), block("alice", "7")];
        match scan_blocks(&blocks, &spec) {
            ProbeOutcome::Found(node) => assert_eq!(node["pk"], "7"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_reports_mismatch_for_other_author() {
        // Mentions alice so it passes the pre-filter, but the post is bob's.
        let stale = block("bob", "1").replace("hello", "hi alice");
        let spec = MatchSpec::post_by("alice");
        assert_eq!(scan_blocks(&[stale], &spec), ProbeOutcome::Mismatch);
    }

    #[test]
    fn test_match_preferred_over_earlier_mismatch() {
        let stale = block("bob", "1").replace("hello", "hi alice");
        let spec = MatchSpec::post_by("alice");
        let outcome = scan_blocks(&[stale, block("alice", "2")], &spec);
        assert_eq!(outcome.kind(), ProbeKind::Found);
    }

    #[test]
    fn test_prefilter_rejects_without_parsing() {
        let spec = MatchSpec::post_by("alice");
        // Not JSON at all; would only fail if it got parsed.
        let blocks = vec!["garbage mentioning alice".to_string(), "{not json".to_string()];
        assert_eq!(scan_blocks(&blocks, &spec), ProbeOutcome::NotYetAvailable);
    }

    #[test]
    fn test_unparseable_block_skipped() {
        let spec = MatchSpec::post_by("alice");
        let blocks = vec![
            "{\"thread_items\": alice".to_string(),
            block("alice", "3"),
        ];
        assert_eq!(scan_blocks(&blocks, &spec).kind(), ProbeKind::Found);
    }

    fn rendered(author: &str, video_src: &str) -> String {
        format!(
            r#"<html><head><meta property="og:description" content="clip for alice"></head>
            <body><a href="/@{author}">{author}</a><video src="{video_src}"></video></body></html>"#
        )
    }

    #[test]
    fn test_rendered_video_by_target_is_found() {
        let spec = MatchSpec::post_by("alice");
        match scan_html(&rendered("alice", "https://cdn/v.mp4"), &spec) {
            ProbeOutcome::Found(doc) => {
                assert_eq!(doc["user"]["username"], "alice");
                assert_eq!(doc["carousel_media"][0]["video_versions"][0]["url"], "https://cdn/v.mp4");
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_rendered_author_link_decides_mismatch() {
        // Mentions alice in the caption, but the author link is bob's.
        let spec = MatchSpec::post_by("alice");
        assert_eq!(
            scan_html(&rendered("bob", "https://cdn/v.mp4"), &spec),
            ProbeOutcome::Mismatch
        );
    }

    #[test]
    fn test_rendered_blob_only_video_not_yet_available() {
        let spec = MatchSpec::post_by("alice");
        let html = rendered("alice", "blob:https://www.threads.net/9f1c");
        assert_eq!(scan_html(&html, &spec), ProbeOutcome::NotYetAvailable);
    }

    #[test]
    fn test_rendered_page_without_video_not_yet_available() {
        let spec = MatchSpec::post_by("alice");
        let html = r#"<a href="/@alice">alice</a><img src="https://cdn/p.jpg">"#;
        assert_eq!(scan_html(html, &spec), ProbeOutcome::NotYetAvailable);
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(
            scan_blocks(&[], &MatchSpec::post_by("alice")),
            ProbeOutcome::NotYetAvailable
        );
    }
}
