// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! threadgrab runtime: drive a headless page to a post, poll it for the
//! post's data, and hand back a normalized media list.
//!
//! The pure matching and normalization logic lives in the `threadgrab`
//! crate; this crate adds the browser, the job lifecycle and the CLI.

pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod events;
pub mod extraction;
pub mod renderer;

pub use config::{DownloadConfig, ExtractionConfig};
pub use error::{ExtractionError, ExtractionResult};
pub use extraction::{Extractor, JobStatus, StrategyKind, Target};
