use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "ROUTE_RISK_CONFIG";

/// Runtime settings, stored as a JSON object on disk:
/// ```json
/// {
///   "freshness_window_secs": 30,
///   "columns": { "visibility": ["visibility", "vis_km"] }
/// }
/// ```
/// Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub columns: ColumnConfig,
    pub freshness_window_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            columns: ColumnConfig::default(),
            freshness_window_secs: 30,
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Loads from `explicit`, then `ROUTE_RISK_CONFIG`, else falls back to defaults.
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV).ok();
        match explicit.or(from_env.as_deref()) {
            Some(path) => {
                debug!(path, "Loading settings");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }
}

/// Accepted header names for each logical station field.
///
/// Alias lists are tried in order against lower-cased, trimmed headers.
/// Keyword lists are substring matches used only when no alias matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,
    pub precipitation: Vec<String>,
    pub visibility: Vec<String>,
    pub precipitation_keywords: Vec<String>,
    pub visibility_keywords: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            latitude: owned(&["lat", "latitude"]),
            longitude: owned(&["lon", "longitude", "lng"]),
            precipitation: owned(&["precip", "precipitation", "rainfall", "rain", "prcp"]),
            visibility: owned(&["visibility", "vis"]),
            precipitation_keywords: owned(&["rain", "precip", "prcp"]),
            visibility_keywords: owned(&["vis", "sight"]),
        }
    }
}
