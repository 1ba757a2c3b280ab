// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use threadgrab_runtime::cli::{self, extract_cmd::ExtractArgs, output};
use threadgrab_runtime::{ExtractionError, StrategyKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "threadgrab",
    about = "threadgrab: pull downloadable videos out of Threads posts",
    version,
    after_help = "Run 'threadgrab <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging and print job events
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract media from a post URL
    Extract {
        /// Post URL (e.g. "https://www.threads.net/@user/post/ABC123")
        url: String,
        /// How to read the page
        #[arg(long, value_enum)]
        strategy: Option<StrategyKind>,
        /// Overall deadline in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Poll interval in milliseconds
        #[arg(long)]
        interval: Option<u64>,
        /// Maximum number of poll attempts
        #[arg(long)]
        attempts: Option<u32>,
        /// Download every media item after extraction
        #[arg(long)]
        download: bool,
        /// Download directory (defaults to THREADGRAB_DOWNLOAD_DIR or the videos folder)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("threadgrab={level},threadgrab_runtime={level}"))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("THREADGRAB_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("THREADGRAB_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("THREADGRAB_VERBOSE", "1");
    }
    init_tracing(cli.verbose, cli.log_json);

    let result = match cli.command {
        Commands::Extract {
            url,
            strategy,
            timeout,
            interval,
            attempts,
            download,
            out,
        } => {
            cli::extract_cmd::run(ExtractArgs {
                url,
                strategy,
                timeout_ms: timeout,
                interval_ms: interval,
                attempts,
                download,
                out,
            })
            .await
        }
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "threadgrab", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if output::is_json() {
            let kind = e
                .downcast_ref::<ExtractionError>()
                .map(ExtractionError::kind)
                .unwrap_or("internal");
            output::print_json(&serde_json::json!({
                "error": true,
                "kind": kind,
                "message": format!("{e:#}"),
            }));
        } else if !output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
