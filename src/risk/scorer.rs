use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::cache::{FALLBACK_PROBABILITY, RiskCache};
use super::category::{CategoryTriple, LightingCategory, RoadCategory, WeatherCategory};
use crate::error::Result;
use crate::geo::Coordinate;
use crate::weather::WeatherIndex;

/// Lower edge of the calibrated display band.
pub const CALIBRATED_FLOOR: f64 = 0.25;
/// Width of the calibrated display band.
pub const CALIBRATED_SPAN: f64 = 0.20;
/// Calibrated value when every cache entry is equal.
pub const CALIBRATED_DEGENERATE: f64 = 0.35;

/// Full result for one scored stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub risk_prob: f64,
    pub raw_prob: f64,
    pub rainfall_mm: f64,
    pub visibility: f64,
    pub weather: WeatherCategory,
    pub road: RoadCategory,
    pub lighting: LightingCategory,
}

/// One stop in a batch request. Coordinates stay loosely typed until scoring
/// so a malformed item fails alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopQuery {
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
}

impl StopQuery {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(Value::from(lat)),
            lon: Some(Value::from(lon)),
        }
    }
}

/// Per-stop batch result: either a breakdown or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopOutcome {
    pub lat: Value,
    pub lon: Value,
    pub risk_prob: f64,
    pub breakdown: Option<RiskBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StopOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Maps `raw` onto the fixed `[0.25, 0.45]` band using the cache's spread.
pub fn calibrate(raw: f64, (min, max): (f64, f64)) -> f64 {
    if max > min {
        let normalized = (raw - min) / (max - min);
        CALIBRATED_FLOOR + normalized * CALIBRATED_SPAN
    } else {
        CALIBRATED_DEGENERATE
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Nearest-station weather plus the cached classifier output.
///
/// Deterministic for a fixed index and cache; holds no mutable state.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    index: WeatherIndex,
    cache: RiskCache,
}

impl RiskScorer {
    pub fn new(index: WeatherIndex, cache: RiskCache) -> Self {
        Self { index, cache }
    }

    pub fn index(&self) -> &WeatherIndex {
        &self.index
    }

    pub fn cache(&self) -> &RiskCache {
        &self.cache
    }

    pub fn score(&self, point: &Coordinate) -> RiskBreakdown {
        let station = self.index.nearest(point);
        let rainfall = station.precipitation();
        let visibility = station.visibility();

        let triple = CategoryTriple::classify(rainfall, visibility);
        let raw = self.cache.get(&triple);
        let calibrated = calibrate(raw, self.cache.value_range());

        debug!(lat = point.lat, lon = point.lon, %triple, raw, calibrated, "Scored stop");

        RiskBreakdown {
            risk_prob: round_to(calibrated, 4),
            raw_prob: round_to(raw, 4),
            rainfall_mm: round_to(rainfall, 1),
            visibility: round_to(visibility, 1),
            weather: triple.weather,
            road: triple.road,
            lighting: triple.lighting,
        }
    }

    /// Validates and scores a loosely-typed stop.
    pub fn score_stop(&self, stop: &StopQuery) -> Result<RiskBreakdown> {
        let point = Coordinate::from_values(stop.lat.as_ref(), stop.lon.as_ref())?;
        Ok(self.score(&point))
    }

    /// Scores each stop independently. Output order and length match the input.
    pub fn score_batch(&self, stops: &[StopQuery]) -> Vec<StopOutcome> {
        let outcomes: Vec<StopOutcome> = stops
            .iter()
            .map(|stop| {
                let lat = stop.lat.clone().unwrap_or(Value::Null);
                let lon = stop.lon.clone().unwrap_or(Value::Null);
                match self.score_stop(stop) {
                    Ok(breakdown) => StopOutcome {
                        lat,
                        lon,
                        risk_prob: breakdown.risk_prob,
                        breakdown: Some(breakdown),
                        error: None,
                    },
                    Err(e) => {
                        debug!(error = %e, "Stop rejected");
                        StopOutcome {
                            lat,
                            lon,
                            risk_prob: FALLBACK_PROBABILITY,
                            breakdown: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(stops = outcomes.len(), failed, "Batch scored");
        outcomes
    }
}
