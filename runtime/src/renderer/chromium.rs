// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Post pages serve a login wall to the default headless user agent.
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Places a Chromium binary may live, most specific first.
fn chromium_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(p) = std::env::var("THREADGRAB_CHROMIUM_PATH") {
        candidates.push(PathBuf::from(p));
    }

    if let Some(home) = dirs::home_dir() {
        let root = home.join(".threadgrab/chromium");
        if cfg!(target_os = "macos") {
            for arch in ["chrome-mac-arm64", "chrome-mac-x64"] {
                candidates.push(root.join(arch).join(
                    "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
                ));
            }
        } else {
            candidates.push(root.join("chrome-linux64/chrome"));
        }
        candidates.push(root.join("chrome"));
    }

    candidates.extend(
        ["google-chrome", "chromium", "chromium-browser"]
            .into_iter()
            .filter_map(|name| which::which(name).ok()),
    );

    if cfg!(target_os = "macos") {
        candidates.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
    }
    candidates
}

/// Find the Chromium binary: `THREADGRAB_CHROMIUM_PATH`, `~/.threadgrab/chromium`,
/// then `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    chromium_candidates().into_iter().find(|p| p.exists())
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn new() -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set THREADGRAB_CHROMIUM_PATH or install Chrome.")?;
        tracing::debug!("launching {}", chrome_path.display());

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--mute-audio")
            .arg("--autoplay-policy=no-user-gesture-required")
            .arg(format!("--user-agent={DESKTOP_USER_AGENT}"))
            .window_size(1280, 900)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP connection.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("chromium handler error: {e}");
                }
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open tab")?;
        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // The browser process exits when `Browser` is dropped.
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// One Chromium tab.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn evaluate_as<T: DeserializeOwned>(&self, script: &str, what: &str) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .with_context(|| format!("failed to {what}"))?
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to decode result of {what}: {e:?}"))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let started = Instant::now();
        let page = &self.page;

        let final_url = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            page.goto(url).await?;
            // Render-complete: the load event of this navigation.
            page.wait_for_navigation().await?;
            page.url().await
        })
        .await
        .with_context(|| format!("navigation to {url} timed out after {timeout_ms}ms"))?
        .with_context(|| format!("navigation to {url} failed"))?
        .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            // The load event awaited above belongs to this navigation.
            requested_url: url.to_string(),
            final_url,
            // CDP does not report the document status through this path.
            status: 200,
            load_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        self.evaluate_as(script, "evaluate script").await
    }

    async fn get_html(&self) -> Result<String> {
        self.evaluate_as("document.documentElement.outerHTML", "read page HTML")
            .await
    }

    async fn stop(&self) -> Result<()> {
        self.evaluate_as::<bool>("window.stop(), true", "stop loading")
            .await
            .map(drop)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close tab")?;
        Ok(())
    }
}
