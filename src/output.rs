//! Output formatting and persistence for scored stops.
//!
//! Supports JSON logging and CSV append.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::risk::StopOutcome;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One flat CSV row per scored stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StopReportRow {
    pub timestamp: DateTime<Utc>,
    pub lat: String,
    pub lon: String,
    pub risk_prob: f64,
    pub raw_prob: Option<f64>,
    pub rainfall_mm: Option<f64>,
    pub visibility: Option<f64>,
    pub weather: Option<String>,
    pub road: Option<String>,
    pub lighting: Option<String>,
    pub error: Option<String>,
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl StopReportRow {
    pub fn from_outcome(outcome: &StopOutcome, timestamp: DateTime<Utc>) -> Self {
        let b = outcome.breakdown.as_ref();
        StopReportRow {
            timestamp,
            lat: cell(&outcome.lat),
            lon: cell(&outcome.lon),
            risk_prob: outcome.risk_prob,
            raw_prob: b.map(|b| b.raw_prob),
            rainfall_mm: b.map(|b| b.rainfall_mm),
            visibility: b.map(|b| b.visibility),
            weather: b.map(|b| b.weather.to_string()),
            road: b.map(|b| b.road.to_string()),
            lighting: b.map(|b| b.lighting.to_string()),
            error: outcome.error.clone(),
        }
    }
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends one row per outcome to a CSV file, stamped with the current time.
///
/// Creates the file with headers if it does not already exist.
pub fn append_outcomes(path: &str, outcomes: &[StopOutcome]) -> Result<usize> {
    let now = Utc::now();
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = outcomes.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for outcome in outcomes {
        writer.serialize(StopReportRow::from_outcome(outcome, now))?;
    }
    writer.flush()?;

    Ok(outcomes.len())
}
