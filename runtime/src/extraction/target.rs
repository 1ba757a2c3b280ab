// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Target post URLs and the match spec derived from them.

use crate::error::{ExtractionError, ExtractionResult};
use threadgrab::MatchSpec;
use url::Url;

/// Hosts whose post pages we know how to read.
const POST_HOSTS: [&str; 2] = ["threads.net", "threads.com"];

/// A validated post URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The URL exactly as it will be navigated to.
    pub url: String,
    /// Author username from the `/@user/...` path segment.
    pub username: String,
}

impl Target {
    /// Validate a user-supplied post URL.
    pub fn parse(input: &str) -> ExtractionResult<Self> {
        let trimmed = input.trim();
        let parsed = Url::parse(trimmed)
            .map_err(|e| ExtractionError::InvalidTarget(format!("{trimmed}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExtractionError::InvalidTarget(format!(
                "{trimmed}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let known = POST_HOSTS
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")));
        if !known {
            return Err(ExtractionError::InvalidTarget(format!(
                "{trimmed}: not a Threads link"
            )));
        }

        let username = parsed
            .path_segments()
            .into_iter()
            .flatten()
            .find_map(|seg| seg.strip_prefix('@'))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ExtractionError::InvalidTarget(format!("{trimmed}: no @username in path"))
            })?;

        Ok(Self {
            url: trimmed.to_string(),
            username,
        })
    }

    /// Spec identifying this post's data on the page.
    pub fn match_spec(&self) -> MatchSpec {
        MatchSpec::post_by(&self.username)
    }
}
