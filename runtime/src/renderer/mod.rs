// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). Extraction
//! jobs only ever see a `RenderContext`, which is not reentrant: exactly
//! one job drives it at a time.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Render-complete signal for one navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The URL that was asked for.
    pub requested_url: String,
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

impl NavigationResult {
    /// Whether this signal belongs to a navigation towards `target`.
    ///
    /// Signals from earlier loads (an `about:blank` reset, a superseded
    /// target) fail this check and must be ignored. The Chromium context
    /// awaits each navigation's own load event and always reports the URL it
    /// was asked for as `requested_url`, so for it only the reset is ever
    /// rejected; engines that deliver load signals asynchronously can report
    /// a stale `requested_url` and fail the check.
    pub fn is_for(&self, target: &str) -> bool {
        self.requested_url == target || self.final_url == target
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL and wait for the render-complete signal.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full rendered HTML.
    async fn get_html(&self) -> Result<String>;
    /// Stop any in-progress loading.
    async fn stop(&self) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
