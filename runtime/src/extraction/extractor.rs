// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-flight extraction service over one page.
//!
//! Submitting a new target supersedes whatever job is live: the old job's
//! delivery is cancelled first, then its token, so it can never hand over a
//! result once the new job exists.

use super::job::{Delivery, ExtractionJob, JobStatus, PageSlot, ResultCallback};
use super::target::Target;
use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, ExtractionResult};
use crate::events::{self, EventReceiver, EventSender, JobEmitter};
use crate::renderer::RenderContext;
use std::sync::{Arc, Mutex};
use threadgrab::CanonicalPost;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct LiveJob {
    id: String,
    cancel: CancellationToken,
    delivery: Arc<Delivery>,
}

impl LiveJob {
    fn supersede(self) {
        let undelivered = self.delivery.cancel();
        self.cancel.cancel();
        if undelivered {
            info!("job {}: superseded", self.id);
        }
    }
}

/// Handle to a spawned job.
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    join: JoinHandle<JobStatus>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the job to reach a terminal state.
    ///
    /// A job task that panicked or was aborted reports `Failed`.
    pub async fn wait(self) -> JobStatus {
        match self.join.await {
            Ok(status) => status,
            Err(e) => {
                warn!("job {}: task ended abnormally: {e}", self.id);
                JobStatus::Failed
            }
        }
    }
}

/// Owns the page and runs at most one extraction job against it at a time.
pub struct Extractor {
    page: PageSlot,
    config: ExtractionConfig,
    events: EventSender,
    live: Mutex<Option<LiveJob>>,
}

impl Extractor {
    pub fn new(context: Box<dyn RenderContext>, config: ExtractionConfig) -> Self {
        let (events, _) = events::channel();
        Self {
            page: Arc::new(tokio::sync::Mutex::new(Some(context))),
            config,
            events,
            live: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Subscribe to lifecycle events of every job submitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Start extracting `url`, superseding the live job.
    ///
    /// `callback` fires exactly once with the result, unless the job is
    /// itself superseded or cancelled first, in which case it never fires.
    /// An invalid URL is rejected here and leaves the live job running.
    pub fn submit_with(&self, url: &str, callback: ResultCallback) -> ExtractionResult<JobHandle> {
        let target = Target::parse(url)?;
        let id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let delivery = Arc::new(Delivery::new(callback));

        let job = ExtractionJob::new(
            target,
            self.config.clone(),
            cancel.clone(),
            Arc::clone(&delivery),
            JobEmitter::new(Some(self.events.clone()), id.clone()),
        );

        let previous = self.lock_live().replace(LiveJob {
            id: id.clone(),
            cancel,
            delivery,
        });
        if let Some(previous) = previous {
            previous.supersede();
        }

        debug!("job {id}: spawned");
        let join = tokio::spawn(job.run(Arc::clone(&self.page)));
        Ok(JobHandle { id, join })
    }

    /// Extract `url` and wait for the result.
    ///
    /// Resolves to [`ExtractionError::Cancelled`] if a later submission or
    /// [`Extractor::cancel`] supersedes this one.
    pub async fn submit(&self, url: &str) -> ExtractionResult<CanonicalPost> {
        let (tx, rx) = oneshot::channel();
        self.submit_with(
            url,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        )?;
        // A cancelled delivery drops the sender.
        rx.await.unwrap_or(Err(ExtractionError::Cancelled))
    }

    /// Cancel the live job, if any. Returns whether one was still pending.
    pub fn cancel(&self) -> bool {
        match self.lock_live().take() {
            Some(live) => {
                let pending = live.delivery.cancel();
                live.cancel.cancel();
                pending
            }
            None => false,
        }
    }

    /// Cancel the live job and close the page once it is released.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.cancel();
        let context = self.page.lock().await.take();
        if let Some(context) = context {
            context.close().await?;
        }
        Ok(())
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, Option<LiveJob>> {
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = self.lock_live().as_ref().map(|job| job.id.clone());
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("live", &live)
            .finish()
    }
}
