// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Job event types and broadcast channel for extraction telemetry.
//!
//! Jobs emit `JobEvent`s through a `tokio::sync::broadcast` channel to any
//! subscriber (the CLI in verbose mode, tests). When no subscriber exists,
//! events are silently dropped.

use crate::extraction::job::JobStatus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// An event emitted by an extraction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// The job this event belongs to.
    pub job_id: String,
    /// Monotonically increasing per-job sequence number.
    pub seq: u64,
    /// The kind of event.
    pub kind: JobEventKind,
}

/// The specific kind of job event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEventKind {
    /// The job moved between lifecycle states.
    StatusChanged { from: JobStatus, to: JobStatus },
    /// A render-complete signal for another URL was ignored.
    RenderSignalIgnored { url: String },
    /// One poll tick finished.
    Probed { attempt: u32, outcome: ProbeKind },
    /// The job's result was handed to the caller.
    Delivered { ok: bool },
}

/// Outcome of a poll tick, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Found,
    NotYetAvailable,
    Mismatch,
}

/// Sender handle for emitting job events.
pub type EventSender = tokio::sync::broadcast::Sender<JobEvent>;

/// Receiver handle for consuming job events.
pub type EventReceiver = tokio::sync::broadcast::Receiver<JobEvent>;

/// Create a new job event channel with a bounded buffer.
///
/// A job emits a handful of status changes plus one event per poll tick,
/// so 256 events comfortably cover several jobs.
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emits events for one job, numbering them in order.
///
/// Usable through a shared reference so in-flight probes can report ticks.
#[derive(Debug)]
pub struct JobEmitter {
    tx: Option<EventSender>,
    job_id: String,
    seq: AtomicU64,
}

impl JobEmitter {
    pub fn new(tx: Option<EventSender>, job_id: impl Into<String>) -> Self {
        Self {
            tx,
            job_id: job_id.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// Emit an event, ignoring send errors (no receivers listening).
    pub fn emit(&self, kind: JobEventKind) {
        if let Some(ref sender) = self.tx {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = sender.send(JobEvent {
                job_id: self.job_id.clone(),
                seq,
                kind,
            });
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}
