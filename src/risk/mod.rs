//! Accident-risk scoring for stop coordinates.
//!
//! A stop is classified from its nearest station's rainfall and visibility
//! into a [`CategoryTriple`], looked up in a precomputed [`RiskCache`], and
//! calibrated onto a fixed display band by [`RiskScorer`].

mod cache;
mod category;
mod classifier;
mod scorer;

pub use cache::{FALLBACK_PROBABILITY, RiskCache};
pub use category::{
    CLOUDY_ABOVE_MM, CategoryTriple, LightingCategory, NIGHT_BELOW_KM, RAINY_ABOVE_MM,
    RoadCategory, WET_ROAD_ABOVE_MM, WeatherCategory,
};
pub use classifier::{Classifier, LabelEncoder, LogisticBundle};
pub use scorer::{
    CALIBRATED_DEGENERATE, CALIBRATED_FLOOR, CALIBRATED_SPAN, RiskBreakdown, RiskScorer,
    StopOutcome, StopQuery, calibrate,
};
