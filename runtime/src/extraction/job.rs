// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! One end-to-end extraction: navigate, poll, normalize, deliver.
//!
//! ```text
//! Idle -> Navigating -> Polling -> { Succeeded | Failed | Cancelled }
//! ```
//!
//! Terminal states are absorbing. Navigation and polling together are
//! bounded by one overall deadline. The job owns the page for its whole
//! lifetime and stops any loading on every exit path.

use super::poll::{PollScheduler, PollStop};
use super::probe::probe;
use super::strategy::ExtractionStrategy;
use super::target::Target;
use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, ExtractionResult};
use crate::events::{JobEmitter, JobEventKind};
use crate::renderer::{NavigationResult, RenderContext};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use threadgrab::{normalize, CanonicalPost, MatchSpec};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The page shared between successive jobs. `None` once the extractor is shut down.
pub type PageSlot = Arc<tokio::sync::Mutex<Option<Box<dyn RenderContext>>>>;

/// Caller-supplied result callback. Never invoked for cancelled jobs.
pub type ResultCallback = Box<dyn FnOnce(ExtractionResult<CanonicalPost>) + Send + 'static>;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Idle,
    Navigating,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows `self -> next`.
    pub fn can_become(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Cancelled) => true,
            (Idle, Navigating | Failed) => true,
            (Navigating, Polling | Failed) => true,
            (Polling, Succeeded | Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Per-job lifecycle record.
#[derive(Debug, Clone)]
pub struct JobState {
    pub target_url: String,
    pub match_spec: MatchSpec,
    pub status: JobStatus,
    pub attempt_count: u32,
}

const PENDING: u8 = 0;
const DELIVERED: u8 = 1;
const CANCELLED: u8 = 2;

/// At-most-once hand-off of a job's result.
///
/// Every producer (poll success, timeout, failure) and the canceller race
/// on the same compare-and-set; only the winner acts.
pub struct Delivery {
    state: AtomicU8,
    callback: Mutex<Option<ResultCallback>>,
}

impl Delivery {
    pub fn new(callback: ResultCallback) -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            callback: Mutex::new(Some(callback)),
        }
    }

    /// Claim the right to deliver. Returns the callback exactly once, and
    /// never after [`Delivery::cancel`] won.
    pub fn claim(&self) -> Option<ResultCallback> {
        self.state
            .compare_exchange(PENDING, DELIVERED, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.callback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Forbid delivery. Returns `false` if a result was already claimed.
    pub fn cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            // Release whatever the callback captured.
            self.callback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
        }
        won
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish()
    }
}

/// How the pipeline stopped, before delivery is attempted.
enum Step {
    Done(ExtractionResult<CanonicalPost>),
    Cancelled,
}

/// One extraction request, from navigation to result delivery.
pub struct ExtractionJob {
    target: Target,
    strategy: ExtractionStrategy,
    config: ExtractionConfig,
    cancel: CancellationToken,
    delivery: Arc<Delivery>,
    emitter: JobEmitter,
    state: Mutex<JobState>,
}

impl ExtractionJob {
    pub fn new(
        target: Target,
        config: ExtractionConfig,
        cancel: CancellationToken,
        delivery: Arc<Delivery>,
        emitter: JobEmitter,
    ) -> Self {
        let state = JobState {
            target_url: target.url.clone(),
            match_spec: target.match_spec(),
            status: JobStatus::Idle,
            attempt_count: 0,
        };
        Self {
            strategy: ExtractionStrategy::from_kind(config.strategy),
            target,
            config,
            cancel,
            delivery,
            emitter,
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> &str {
        self.emitter.job_id()
    }

    /// Run the job to a terminal state and return it.
    pub async fn run(self, page: PageSlot) -> JobStatus {
        info!(
            "job {}: extracting {} ({})",
            self.id(),
            self.target.url,
            self.strategy.kind().as_str()
        );

        // Wait for the previous job to release the page.
        let mut guard = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.finish(Step::Cancelled),
            guard = page.lock_owned() => guard,
        };

        let step = match guard.as_deref_mut() {
            Some(context) => {
                let deadline = Instant::now() + self.config.overall_timeout;
                let step = self.pipeline(context, deadline).await;
                // Teardown on every exit path, after any in-flight probe settled.
                if let Err(e) = context.stop().await {
                    warn!("job {}: failed to stop page: {e:#}", self.id());
                }
                step
            }
            None => Step::Done(Err(ExtractionError::NavigationFailed {
                url: self.target.url.clone(),
                reason: "page is closed".to_string(),
            })),
        };
        drop(guard);

        self.finish(step)
    }

    /// Navigate, then poll until data, exhaustion, cancellation or `deadline`.
    ///
    /// A navigation still in progress is abandoned on cancellation or
    /// deadline. A probe in progress is always awaited; its result is then
    /// discarded.
    async fn pipeline(&self, page: &mut dyn RenderContext, deadline: Instant) -> Step {
        self.transition(JobStatus::Navigating);

        let navigated = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Step::Cancelled,
            _ = sleep_until(deadline) => return self.timed_out(),
            navigated = self.navigate(page) => navigated,
        };
        let signal = match navigated {
            Ok(signal) => signal,
            Err(e) => return Step::Done(Err(e)),
        };
        debug!(
            "job {}: rendered {} in {}ms",
            self.id(),
            signal.final_url,
            signal.load_time_ms
        );

        self.transition(JobStatus::Polling);
        let page: &dyn RenderContext = page;
        let spec = self.lock_state().match_spec.clone();
        let scheduler = PollScheduler::new(self.config.poll_interval, self.config.max_attempts);
        let stop_polling = self.cancel.child_token();

        let polling = scheduler.run(&stop_polling, |attempt| {
            self.lock_state().attempt_count = attempt;
            let tick = probe(page, &self.strategy, &spec);
            let emitter = &self.emitter;
            async move {
                let outcome = tick.await;
                emitter.emit(JobEventKind::Probed {
                    attempt,
                    outcome: outcome.kind(),
                });
                outcome
            }
        });
        tokio::pin!(polling);

        let early = tokio::select! {
            biased;
            polled = &mut polling => Some(polled),
            _ = sleep_until(deadline) => None,
        };
        let polled = match early {
            Some(polled) => polled,
            None => {
                // Let the in-flight probe finish; the scheduler discards it.
                stop_polling.cancel();
                let _ = polling.await;
                return self.timed_out();
            }
        };

        match polled {
            Ok(success) => {
                debug!(
                    "job {}: post data found on attempt {}",
                    self.id(),
                    success.attempts
                );
                Step::Done(normalize(&success.document).map_err(ExtractionError::from))
            }
            Err(PollStop::Exhausted {
                attempts,
                mismatches,
            }) => Step::Done(Err(ExtractionError::PollExhausted {
                target: self.target.username.clone(),
                attempts,
                mismatches,
            })),
            Err(PollStop::Cancelled) => Step::Cancelled,
        }
    }

    /// Optional blank reset, then the target, checked against its signal.
    async fn navigate(&self, page: &mut dyn RenderContext) -> ExtractionResult<NavigationResult> {
        let nav_timeout_ms = self.config.navigation_timeout.as_millis() as u64;

        if self.config.reset_before_navigate {
            match page.navigate("about:blank", nav_timeout_ms).await {
                Ok(signal) => {
                    // A blank page never identifies as the target.
                    self.accept_signal(&signal);
                }
                Err(e) => debug!("job {}: blank reset failed: {e:#}", self.id()),
            }
        }

        let signal = page
            .navigate(&self.target.url, nav_timeout_ms)
            .await
            .map_err(|e| ExtractionError::NavigationFailed {
                url: self.target.url.clone(),
                reason: format!("{e:#}"),
            })?;
        if !self.accept_signal(&signal) {
            return Err(ExtractionError::NavigationFailed {
                url: self.target.url.clone(),
                reason: format!("render completed for unexpected URL {}", signal.final_url),
            });
        }
        Ok(signal)
    }

    fn timed_out(&self) -> Step {
        let limit = self.config.overall_timeout;
        let attempts = self.lock_state().attempt_count;
        warn!(
            "job {}: deadline of {}ms exceeded after {attempts} attempt(s)",
            self.id(),
            limit.as_millis()
        );
        Step::Done(Err(ExtractionError::Timeout {
            after_ms: limit.as_millis() as u64,
        }))
    }

    /// Check a render-complete signal against the current target.
    fn accept_signal(&self, signal: &NavigationResult) -> bool {
        if signal.is_for(&self.target.url) {
            return true;
        }
        debug!(
            "job {}: ignoring render-complete for {}",
            self.id(),
            signal.final_url
        );
        self.emitter.emit(JobEventKind::RenderSignalIgnored {
            url: signal.final_url.clone(),
        });
        false
    }

    /// Move to a terminal state and, if this job still owns delivery, hand
    /// the result to the caller.
    fn finish(&self, step: Step) -> JobStatus {
        match step {
            Step::Cancelled => {
                self.delivery.cancel();
                self.transition(JobStatus::Cancelled);
                info!("job {}: cancelled", self.id());
            }
            Step::Done(result) => match self.delivery.claim() {
                Some(callback) => {
                    let ok = result.is_ok();
                    match &result {
                        Ok(post) => info!(
                            "job {}: {} post with {} media item(s)",
                            self.id(),
                            post.post_type,
                            post.media.len()
                        ),
                        Err(e) => warn!("job {}: failed: {e}", self.id()),
                    }
                    self.transition(if ok {
                        JobStatus::Succeeded
                    } else {
                        JobStatus::Failed
                    });
                    self.emitter.emit(JobEventKind::Delivered { ok });
                    callback(result);
                }
                None => {
                    debug_assert!(self.delivery.is_cancelled());
                    debug!("job {}: superseded before delivery, result discarded", self.id());
                    self.transition(JobStatus::Cancelled);
                }
            },
        }
        self.lock_state().status
    }

    fn transition(&self, to: JobStatus) -> bool {
        let from = {
            let mut state = self.lock_state();
            let from = state.status;
            if !from.can_become(to) {
                return false;
            }
            state.status = to;
            from
        };
        debug!("job {}: {from} -> {to}", self.id());
        self.emitter
            .emit(JobEventKind::StatusChanged { from, to });
        true
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, JobState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
