// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration: defaults, environment overrides.

use crate::extraction::strategy::StrategyKind;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_MAX_ATTEMPTS: u32 = 22;
const DEFAULT_TIMEOUT_MS: u64 = 12_000;
const DEFAULT_NAV_TIMEOUT_MS: u64 = 10_000;

/// Tunables for one extraction job.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Fixed delay between poll ticks.
    pub poll_interval: Duration,
    /// Poll ticks before giving up.
    pub max_attempts: u32,
    /// Deadline for navigation and polling combined.
    pub overall_timeout: Duration,
    /// Timeout handed to each navigation.
    pub navigation_timeout: Duration,
    /// Load `about:blank` before the target so stale content is cleared.
    pub reset_before_navigate: bool,
    /// How the page is probed.
    pub strategy: StrategyKind,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            overall_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            navigation_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            reset_before_navigate: true,
            strategy: StrategyKind::EmbeddedJson,
        }
    }
}

impl ExtractionConfig {
    /// Defaults overridden by `THREADGRAB_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_millis(
                read_env_u64("THREADGRAB_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS).max(1),
            ),
            max_attempts: read_env_u32("THREADGRAB_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
            overall_timeout: Duration::from_millis(
                read_env_u64("THREADGRAB_TIMEOUT_MS", DEFAULT_TIMEOUT_MS).max(1),
            ),
            navigation_timeout: Duration::from_millis(
                read_env_u64("THREADGRAB_NAV_TIMEOUT_MS", DEFAULT_NAV_TIMEOUT_MS).max(1),
            ),
            reset_before_navigate: read_env_bool(
                "THREADGRAB_RESET_BLANK",
                defaults.reset_before_navigate,
            ),
            strategy: read_env_string("THREADGRAB_STRATEGY")
                .and_then(|s| StrategyKind::from_name(&s))
                .unwrap_or(defaults.strategy),
        }
    }
}

/// Where downloaded media lands.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub dir: PathBuf,
}

impl DownloadConfig {
    /// `THREADGRAB_DOWNLOAD_DIR`, else the platform video dir, else `~/Movies`.
    pub fn from_env() -> Self {
        let dir = read_env_string("THREADGRAB_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .or_else(dirs::video_dir)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("Movies")
            });
        Self { dir }
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    read_env_string(name)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_env_u32(name: &str, default: u32) -> u32 {
    read_env_string(name)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_env_bool(name: &str, default: bool) -> bool {
    match read_env_string(name).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
