//! Coordinate parsing and great-circle distance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Builds a coordinate from loosely-typed request values.
    ///
    /// Accepts JSON numbers and numeric strings. Missing, non-numeric,
    /// non-finite or out-of-range values are rejected.
    pub fn from_values(lat: Option<&Value>, lon: Option<&Value>) -> Result<Self> {
        let lat = required_number("lat", lat)?;
        let lon = required_number("lon", lon)?;
        Self::new(lat, lon)
    }

    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::validation("lat", format!("{lat} is outside [-90, 90]")));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::validation("lon", format!("{lon} is outside [-180, 180]")));
        }
        Ok(Self { lat, lon })
    }

    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Great-circle distance between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Interprets a JSON value as a finite number. Numeric strings are accepted.
pub fn number_from_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

pub(crate) fn required_number(field: &'static str, value: Option<&Value>) -> Result<f64> {
    match value {
        None | Some(Value::Null) => Err(Error::validation(field, "missing")),
        Some(v) => number_from_value(v)
            .ok_or_else(|| Error::validation(field, format!("{v} is not a number"))),
    }
}
