//! Index Runtime: username existence index operator tool
//!
//! Seeds an in-memory store, initializes the index, registers and checks
//! usernames, and prints the run as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use index_runtime::{load_usernames, IndexRuntime};
use index_telemetry::{init_tracing, TelemetryConfig};
use username_index::IndexConfig;

/// Username existence index operator tool
#[derive(Parser, Debug)]
#[command(name = "index-runtime")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Newline-delimited file of existing usernames
    #[arg(short, long)]
    seed: Option<PathBuf>,

    /// Username to register before checking (repeatable)
    #[arg(short, long)]
    register: Vec<String>,

    /// Usernames to check
    usernames: Vec<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if args.verbose {
        telemetry = telemetry.with_log_level("debug");
    }
    let _guard = init_tracing(&telemetry)?;

    let config = IndexConfig::from_env();
    let seeded = match &args.seed {
        Some(path) => load_usernames(path)?,
        None => Vec::new(),
    };

    let mut runtime = IndexRuntime::new(seeded, config)?;
    runtime.start().await?;

    let report = runtime.run(&args.register, &args.usernames).await?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("Failed to serialize report")?;
    println!("{}", json);

    runtime.shutdown().await
}
