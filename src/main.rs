use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratelevel::config::RateLevelConfig;
use ratelevel::ratelimit::TracingSink;

/// Replay keys from stdin through a multi-level rate limiter.
///
/// Each non-blank input line is one event for the key it contains; the level
/// reported for that event is written to stdout.
#[derive(Debug, Parser)]
#[command(name = "ratelevel", version, about)]
struct Args {
    /// Rules configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Print one JSON object per event instead of tab-separated text
    #[arg(long)]
    json: bool,

    /// Log every rule evaluation at DEBUG
    #[arg(long)]
    trace_rules: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; stdout is reserved for results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_writer(io::stderr)
            .init();
    }

    info!("Starting ratelevel");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = RateLevelConfig::from_file(&args.config)?;
    info!(
        rules = config.rules.len(),
        precision_ms = config.precision_ms,
        "Configuration loaded"
    );

    let limiter = if args.trace_rules {
        config.build_limiter_with_sink(Arc::new(TracingSink))?
    } else {
        config.build_limiter()?
    };
    info!(window_size = ?limiter.window_size(), "Rate limiter initialized");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut events = 0u64;

    for line in stdin.lock().lines() {
        let line = line?;
        let key = line.trim();
        if key.is_empty() {
            continue;
        }

        let level = limiter.trigger(key);
        events += 1;

        if args.json {
            serde_json::to_writer(&mut out, &serde_json::json!({ "key": key, "level": level }))?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}\t{}", key, level)?;
        }
    }
    out.flush()?;

    info!(
        events = events,
        keys = limiter.tracked_keys(),
        "Input exhausted"
    );
    Ok(())
}
