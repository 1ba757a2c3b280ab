// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use crate::cli::output;
use crate::config::{DownloadConfig, ExtractionConfig};
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use std::path::Path;

/// Check Chromium availability and the download directory.
pub async fn run() -> Result<()> {
    let chromium = find_chromium();
    let downloads = DownloadConfig::from_env();
    let config = ExtractionConfig::from_env();
    let dir_ok = dir_writable(&downloads.dir);

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "download_dir": downloads.dir.display().to_string(),
            "download_dir_writable": dir_ok,
            "strategy": config.strategy.as_str(),
            "ready": chromium.is_some(),
        }));
        return Ok(());
    }

    println!("threadgrab doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Set THREADGRAB_CHROMIUM_PATH or install Chrome."
        ),
    }

    if dir_ok {
        println!("[OK] Download dir: {}", downloads.dir.display());
    } else {
        println!(
            "[!!] Download dir not writable: {} (set THREADGRAB_DOWNLOAD_DIR)",
            downloads.dir.display()
        );
    }

    println!(
        "[--] Strategy: {}, {} attempt(s) every {}ms, deadline {}ms",
        config.strategy.as_str(),
        config.max_attempts,
        config.poll_interval.as_millis(),
        config.overall_timeout.as_millis()
    );

    println!();
    if chromium.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

/// The directory exists and is writable, or could be created.
fn dir_writable(dir: &Path) -> bool {
    let existing = dir.ancestors().find(|p| p.exists());
    match existing.and_then(|p| std::fs::metadata(p).ok()) {
        Some(meta) => meta.is_dir() && !meta.permissions().readonly(),
        None => false,
    }
}
