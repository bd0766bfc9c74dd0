use std::collections::HashMap;
use tracing::{info, warn};

use super::category::CategoryTriple;
use super::classifier::Classifier;
use crate::error::{Error, Result};

/// Probability stored for a combination the classifier could not score.
pub const FALLBACK_PROBABILITY: f64 = 0.35;

/// Precomputed P(risky) for every category triple.
///
/// Built once at startup and read-only afterwards, so it can be shared across
/// threads without locking.
#[derive(Debug, Clone)]
pub struct RiskCache {
    entries: HashMap<CategoryTriple, f64>,
    fallbacks: usize,
}

impl RiskCache {
    /// Scores all 12 combinations. A failed combination gets
    /// [`FALLBACK_PROBABILITY`] and construction continues.
    pub fn build<C: Classifier + ?Sized>(classifier: &C) -> Self {
        let mut entries = HashMap::with_capacity(12);
        let mut fallbacks = 0;

        for triple in CategoryTriple::all() {
            let prob = match checked_probability(classifier, &triple) {
                Ok(p) => p,
                Err(e) => {
                    warn!(combination = %triple, error = %e, "Classifier failed, using fallback");
                    fallbacks += 1;
                    FALLBACK_PROBABILITY
                }
            };
            entries.insert(triple, prob);
        }

        let cache = Self { entries, fallbacks };
        let (min, max) = cache.value_range();
        info!(entries = cache.entries.len(), fallbacks, min, max, "Risk cache built");
        cache
    }

    pub fn get(&self, triple: &CategoryTriple) -> f64 {
        self.entries
            .get(triple)
            .copied()
            .unwrap_or(FALLBACK_PROBABILITY)
    }

    /// Looks up by label; unrecognized labels yield [`FALLBACK_PROBABILITY`].
    pub fn lookup(&self, weather: &str, road: &str, lighting: &str) -> f64 {
        CategoryTriple::parse(weather, road, lighting)
            .map(|t| self.get(&t))
            .unwrap_or(FALLBACK_PROBABILITY)
    }

    /// `(min, max)` over all stored probabilities.
    pub fn value_range(&self) -> (f64, f64) {
        self.entries
            .values()
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or((FALLBACK_PROBABILITY, FALLBACK_PROBABILITY))
    }

    /// Entries in canonical (weather-major) order.
    pub fn entries(&self) -> impl Iterator<Item = (CategoryTriple, f64)> + '_ {
        CategoryTriple::all().map(move |t| (t, self.get(&t)))
    }

    /// How many combinations fell back to [`FALLBACK_PROBABILITY`].
    pub fn fallback_count(&self) -> usize {
        self.fallbacks
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn checked_probability<C: Classifier + ?Sized>(
    classifier: &C,
    triple: &CategoryTriple,
) -> Result<f64> {
    let p = classifier.predict_risk(triple)?;
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(Error::Classifier {
            combination: triple.to_string(),
            reason: format!("probability {p} outside [0, 1]"),
        })
    }
}
