//! CLI entry point for the route risk tool.
//!
//! Provides subcommands for scoring stop coordinates against the nearest
//! weather station, inspecting the precomputed risk cache, and replaying
//! scripted fleet-tracking sessions.

mod services;

use crate::services::replay::ReplaySession;
use crate::services::scoring::{build_cache, build_scorer, load_stops};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use route_risk::config::Settings;
use route_risk::output::{append_outcomes, print_json};
use serde_json::json;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "route_risk")]
#[command(about = "Accident-risk scoring for bus stops and live fleet tracking", long_about = None)]
struct Cli {
    /// Settings JSON file (overrides ROUTE_RISK_CONFIG)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a list of stops against the nearest weather station
    Score {
        /// Station CSV (optionally .gz) path or URL
        #[arg(short, long, value_name = "FILE_OR_URL")]
        stations: String,

        /// Classifier bundle JSON
        #[arg(short, long)]
        model: String,

        /// JSON file with `[{lat, lon}, ...]` or `{"stops": [...]}`
        #[arg(long)]
        stops: String,

        /// CSV file to append results to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Build the risk cache and print all 12 entries
    Cache {
        /// Classifier bundle JSON
        #[arg(short, long)]
        model: String,
    },
    /// Replay a JSON-lines script of fleet tracking events
    Replay {
        /// Script file, one event per line
        #[arg(short, long)]
        events: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/route_risk.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("route_risk.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Score {
            stations,
            model,
            stops,
            output,
        } => {
            let scorer = build_scorer(&stations, &model, &settings).await?;
            let stops = load_stops(&stops)?;
            if stops.is_empty() {
                anyhow::bail!("No stops provided");
            }

            let outcomes = scorer.score_batch(&stops);
            print_json(&json!({ "stops": outcomes }))?;

            if let Some(path) = output {
                let rows = append_outcomes(&path, &outcomes)?;
                info!(path = %path, rows, "Results appended");
            }
        }
        Commands::Cache { model } => {
            let cache = build_cache(&model)?;
            for (triple, prob) in cache.entries() {
                info!(
                    weather = %triple.weather,
                    road = %triple.road,
                    lighting = %triple.lighting,
                    prob,
                    "Cache entry"
                );
            }
            let (min, max) = cache.value_range();
            info!(min, max, fallbacks = cache.fallback_count(), "Cache summary");
        }
        Commands::Replay { events } => {
            replay(&events, &settings)?;
        }
    }

    Ok(())
}

/// Runs every event in the script, logging each result. Bad lines are
/// reported and skipped.
#[tracing::instrument(skip(settings))]
fn replay(path: &str, settings: &Settings) -> Result<()> {
    let script = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let mut session = ReplaySession::new(settings.freshness_window());

    let mut applied = 0usize;
    let mut rejected = 0usize;

    for (i, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = i + 1;

        let event = match ReplaySession::parse_line(line) {
            Ok(event) => event,
            Err(e) => {
                error!(line = line_no, error = %e, "Unreadable event");
                rejected += 1;
                continue;
            }
        };

        match session.apply(event) {
            Ok(output) => {
                applied += 1;
                print_json(&output)?;
            }
            Err(e) => {
                rejected += 1;
                warn!(line = line_no, error = %e, "Event rejected");
            }
        }
    }

    info!(applied, rejected, "Replay finished");
    Ok(())
}
