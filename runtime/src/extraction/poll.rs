// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-interval, bounded, cancellable polling.
//!
//! Post data either renders within a few ticks or not at all, so the
//! interval never backs off.

use super::probe::ProbeOutcome;
use std::future::Future;
use std::time::Duration;
use threadgrab::RawDocument;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Successful poll: the payload and the tick it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSuccess {
    pub document: RawDocument,
    pub attempts: u32,
}

/// Why polling stopped without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStop {
    /// `max_attempts` ticks ran without a match.
    Exhausted { attempts: u32, mismatches: u32 },
    /// Cancellation was observed; no further probes were started.
    Cancelled,
}

/// Runs a probe on a fixed interval until it finds data, runs out of
/// attempts, or is cancelled.
#[derive(Debug, Clone, Copy)]
pub struct PollScheduler {
    interval: Duration,
    max_attempts: u32,
}

impl PollScheduler {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Poll `probe` (called with the 1-based attempt number).
    ///
    /// The first tick fires one interval after the call. Probes run strictly
    /// one after another. A probe that completes after cancellation has its
    /// result discarded.
    pub async fn run<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut probe: F,
    ) -> Result<PollSuccess, PollStop>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ProbeOutcome>,
    {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut mismatches = 0u32;

        for attempt in 1..=self.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollStop::Cancelled),
                _ = ticker.tick() => {}
            }

            let outcome = probe(attempt).await;
            if cancel.is_cancelled() {
                return Err(PollStop::Cancelled);
            }

            match outcome {
                ProbeOutcome::Found(document) => {
                    return Ok(PollSuccess {
                        document,
                        attempts: attempt,
                    })
                }
                ProbeOutcome::Mismatch => mismatches += 1,
                ProbeOutcome::NotYetAvailable => {}
            }
        }

        Err(PollStop::Exhausted {
            attempts: self.max_attempts,
            mismatches,
        })
    }
}
