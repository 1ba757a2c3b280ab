// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the threadgrab binary.

pub mod doctor;
pub mod extract_cmd;
pub mod output;
