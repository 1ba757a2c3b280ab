// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! `threadgrab extract <url>`: run one extraction job, optionally download.

use crate::cli::output;
use crate::config::{DownloadConfig, ExtractionConfig};
use crate::download::{suggested_filename, DownloadSink, HttpDownloadSink};
use crate::extraction::{Extractor, StrategyKind};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use threadgrab::CanonicalPost;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Flags of the `extract` subcommand. Unset values fall back to the environment.
#[derive(Debug, Clone, Default)]
pub struct ExtractArgs {
    pub url: String,
    pub strategy: Option<StrategyKind>,
    pub timeout_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub attempts: Option<u32>,
    pub download: bool,
    pub out: Option<PathBuf>,
}

impl ExtractArgs {
    /// Apply command-line overrides on top of `base`.
    pub fn config(&self, base: ExtractionConfig) -> ExtractionConfig {
        let mut config = base;
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(ms) = self.timeout_ms {
            config.overall_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = self.interval_ms {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(n) = self.attempts {
            config.max_attempts = n.max(1);
        }
        config
    }

    pub fn download_dir(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| DownloadConfig::from_env().dir)
    }
}

/// Run the extract command.
pub async fn run(args: ExtractArgs) -> Result<()> {
    let config = args.config(ExtractionConfig::from_env());
    if !output::is_quiet() && !output::is_json() {
        eprintln!("  Extracting {} ...", args.url.trim());
    }

    let renderer = ChromiumRenderer::new().await?;
    let context = renderer
        .new_context()
        .await
        .context("failed to open a browser tab")?;
    let extractor = Extractor::new(context, config);
    debug!("extraction config: {:?}", extractor.config());

    let printer = output::is_verbose().then(|| {
        let mut events = extractor.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("  event: {line}");
                        }
                    }
                    Err(RecvError::Lagged(n)) => eprintln!("  event: ({n} dropped)"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let result = extractor.submit(&args.url).await;

    if let Err(e) = extractor.shutdown().await {
        warn!("failed to close page: {e:#}");
    }
    if let Err(e) = renderer.shutdown().await {
        warn!("failed to shut down browser: {e:#}");
    }
    if let Some(printer) = printer {
        printer.abort();
    }

    let post = result?;
    let saved = if args.download {
        download_all(&post, args.download_dir()).await?
    } else {
        Vec::new()
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "post": post,
            "saved": saved.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        }));
    } else if !output::is_quiet() {
        print!("{}", output::render_post(&post));
        for path in &saved {
            println!("  Saved:   {}", path.display());
        }
    }
    Ok(())
}

/// Enqueue every media item and wait for all transfers.
async fn download_all(post: &CanonicalPost, dir: PathBuf) -> Result<Vec<PathBuf>> {
    if !post.has_media() {
        return Ok(Vec::new());
    }
    let sink = HttpDownloadSink::new(dir)?;
    let total = post.media.len();
    let handles: Vec<_> = post
        .media
        .iter()
        .enumerate()
        .map(|(i, item)| sink.enqueue(&item.source_url, &suggested_filename(i, total)))
        .collect();

    let mut saved = Vec::with_capacity(handles.len());
    for handle in handles {
        let url = handle.url().to_string();
        if let Some(path) = handle
            .wait()
            .await
            .with_context(|| format!("failed to download {url}"))?
        {
            saved.push(path);
        }
    }
    Ok(saved)
}
