// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Fire-and-forget media downloads.
//!
//! The extraction core only resolves URLs; storing them is the sink's job.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Filename prefix of saved videos.
pub const FILENAME_PREFIX: &str = "ThreadsVideo";

/// Name for item `index` of a `total`-item post, stamped with the current time.
pub fn suggested_filename(index: usize, total: usize) -> String {
    filename_at(chrono::Utc::now().timestamp_millis(), index, total)
}

fn filename_at(millis: i64, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{FILENAME_PREFIX}_{millis}_{}.mp4", index + 1)
    } else {
        format!("{FILENAME_PREFIX}_{millis}.mp4")
    }
}

/// Something that can store a media URL durably.
pub trait DownloadSink: Send + Sync {
    /// Start storing `source_url`. Returns immediately.
    fn enqueue(&self, source_url: &str, suggested_filename: &str) -> DownloadHandle;
}

/// Handle to one enqueued download.
#[derive(Debug)]
pub enum DownloadHandle {
    /// A transfer is running.
    Started {
        url: String,
        task: JoinHandle<Result<PathBuf>>,
    },
    /// The URL was enqueued before; nothing new was started.
    AlreadyEnqueued { url: String },
}

impl DownloadHandle {
    pub fn url(&self) -> &str {
        match self {
            Self::Started { url, .. } | Self::AlreadyEnqueued { url } => url,
        }
    }

    /// Wait for the transfer. `None` for a duplicate enqueue.
    pub async fn wait(self) -> Result<Option<PathBuf>> {
        match self {
            Self::Started { url, task } => {
                let path = task
                    .await
                    .with_context(|| format!("download task for {url} panicked"))??;
                Ok(Some(path))
            }
            Self::AlreadyEnqueued { .. } => Ok(None),
        }
    }
}

/// Downloads over HTTP into a directory.
#[derive(Debug, Clone)]
pub struct HttpDownloadSink {
    client: reqwest::Client,
    dir: PathBuf,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl HttpDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("threadgrab/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            dir: dir.into(),
            seen: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    fn mark(&self, url: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.to_string())
    }
}

impl DownloadSink for HttpDownloadSink {
    fn enqueue(&self, source_url: &str, suggested_filename: &str) -> DownloadHandle {
        let url = source_url.to_string();
        if !self.mark(&url) {
            debug!("{url} already enqueued");
            return DownloadHandle::AlreadyEnqueued { url };
        }

        let client = self.client.clone();
        let dir = self.dir.clone();
        let seen = Arc::clone(&self.seen);
        let filename = sanitize_filename(suggested_filename);
        let task_url = url.clone();

        let task = tokio::spawn(async move {
            let result = fetch_to(&client, &task_url, &dir, &filename).await;
            match &result {
                Ok(path) => info!("saved {} to {}", task_url, path.display()),
                Err(e) => {
                    warn!("download of {task_url} failed: {e:#}");
                    // Allow a retry.
                    seen.lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .remove(&task_url);
                }
            }
            result
        });

        DownloadHandle::Started { url, task }
    }
}

async fn fetch_to(client: &reqwest::Client, url: &str, dir: &Path, filename: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("{url} returned HTTP {status}");
    }
    let body = response
        .bytes()
        .await
        .with_context(|| format!("failed to read body of {url}"))?;

    let path = unique_path(dir, filename).await;
    tokio::fs::write(&path, &body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// `dir/filename`, or `dir/stem-<n>.ext` if that exists already.
async fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let first = dir.join(filename);
    if !tokio::fs::try_exists(&first).await.unwrap_or(false) {
        return first;
    }
    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(FILENAME_PREFIX);
    let ext = name.extension().and_then(|s| s.to_str()).unwrap_or("mp4");
    let mut n = 2u32;
    loop {
        let candidate = dir.join(format!("{stem}-{n}.{ext}"));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| filename_at(chrono::Utc::now().timestamp_millis(), 0, 1))
}
