//! The external accident-risk classifier seam.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::category::CategoryTriple;
use crate::error::{Error, Result};

/// Anything that maps a category triple to P(risky).
///
/// Implementations may fail; [`RiskCache`](super::RiskCache) absorbs failures.
pub trait Classifier {
    fn predict_risk(&self, triple: &CategoryTriple) -> Result<f64>;
}

impl<F> Classifier for F
where
    F: Fn(&CategoryTriple) -> Result<f64>,
{
    fn predict_risk(&self, triple: &CategoryTriple) -> Result<f64> {
        self(triple)
    }
}

/// Maps category labels to integer codes by their position in `classes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Encodes `label`. Unseen labels are an error.
    pub fn transform(&self, label: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| Error::Classifier {
                combination: label.to_string(),
                reason: format!("label not in encoder classes {:?}", self.classes),
            })
    }
}

/// A logistic-regression model over the three encoded categories, stored as JSON:
/// ```json
/// {
///   "weather_encoder": ["clear", "cloudy", "rainy"],
///   "road_encoder": ["dry", "wet"],
///   "light_encoder": ["day", "night"],
///   "intercept": -1.2,
///   "coefficients": [0.45, 0.6, 0.8]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticBundle {
    pub weather_encoder: LabelEncoder,
    pub road_encoder: LabelEncoder,
    pub light_encoder: LabelEncoder,
    pub intercept: f64,
    pub coefficients: [f64; 3],
}

impl LogisticBundle {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let bundle: LogisticBundle = serde_json::from_str(&content)?;
        debug!(
            intercept = bundle.intercept,
            coefficients = ?bundle.coefficients,
            "Loaded classifier bundle"
        );
        Ok(bundle)
    }

    fn encode(&self, triple: &CategoryTriple) -> Result<[f64; 3]> {
        Ok([
            self.weather_encoder.transform(triple.weather.as_str())? as f64,
            self.road_encoder.transform(triple.road.as_str())? as f64,
            self.light_encoder.transform(triple.lighting.as_str())? as f64,
        ])
    }
}

impl Classifier for LogisticBundle {
    fn predict_risk(&self, triple: &CategoryTriple) -> Result<f64> {
        let x = self.encode(triple)?;
        let z = self.intercept
            + x.iter()
                .zip(self.coefficients.iter())
                .map(|(xi, wi)| xi * wi)
                .sum::<f64>();
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}
