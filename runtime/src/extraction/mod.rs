// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Extraction pipeline: target, strategy, probe, polling, job, service.

pub mod extractor;
pub mod job;
pub mod poll;
pub mod probe;
pub mod strategy;
pub mod target;

pub use extractor::{Extractor, JobHandle};
pub use job::{JobState, JobStatus};
pub use strategy::StrategyKind;
pub use target::Target;
