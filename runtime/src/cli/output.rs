// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Output helpers shared by subcommands.
//!
//! Global flags are published as `THREADGRAB_*` environment variables by
//! `main` so every command can check them.

use threadgrab::{CanonicalPost, PostType};

pub fn is_json() -> bool {
    flag("THREADGRAB_JSON")
}

pub fn is_quiet() -> bool {
    flag("THREADGRAB_QUIET")
}

pub fn is_verbose() -> bool {
    flag("THREADGRAB_VERBOSE")
}

fn flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// Human-readable summary of a post.
pub fn render_post(post: &CanonicalPost) -> String {
    let mut out = String::new();
    let author = match &post.author.username {
        Some(name) if !name.is_empty() => format!("@{name}"),
        _ => post.author.display_name().to_string(),
    };
    out.push_str(&format!("  Author:  {author}\n"));
    out.push_str(&format!("  Caption: {}\n", post.caption_or_default()));
    out.push_str(&format!("  Type:    {}\n", post.post_type));

    if post.media.is_empty() {
        let note = match post.post_type {
            PostType::Image => "image post, nothing to download",
            _ => "no downloadable media",
        };
        out.push_str(&format!("  Media:   none ({note})\n"));
        return out;
    }

    out.push_str(&format!("  Media:   {} item(s)\n", post.media.len()));
    for (i, item) in post.media.iter().enumerate() {
        let duration = item
            .duration_seconds
            .map(|d| format!(" ({d:.1}s)"))
            .unwrap_or_default();
        out.push_str(&format!("    [{}] {}{duration}\n", i + 1, item.source_url));
        if let Some(thumb) = &item.thumbnail_url {
            out.push_str(&format!("        thumbnail: {thumb}\n"));
        }
    }
    out
}
