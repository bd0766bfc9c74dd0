//! Wiring for the `score` and `cache` commands.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use route_risk::config::Settings;
use route_risk::fetch::{BasicClient, read_source};
use route_risk::risk::{LogisticBundle, RiskCache, RiskScorer, StopQuery};
use route_risk::weather::WeatherIndex;

/// Loads the classifier bundle and precomputes all 12 cache entries.
pub fn build_cache(model: &str) -> Result<RiskCache> {
    let bundle =
        LogisticBundle::load(model).with_context(|| format!("failed to load model {model}"))?;
    Ok(RiskCache::build(&bundle))
}

/// Loads stations (file or URL) and the model, returning a ready scorer.
#[tracing::instrument(skip(settings))]
pub async fn build_scorer(stations: &str, model: &str, settings: &Settings) -> Result<RiskScorer> {
    let client = BasicClient::new()?;
    let bytes = read_source(&client, stations).await?;
    let index = WeatherIndex::from_bytes(&bytes, stations, &settings.columns)
        .with_context(|| format!("failed to load stations from {stations}"))?;
    let cache = build_cache(model)?;

    info!(
        stations = index.len(),
        mode = ?index.mode(),
        fallbacks = cache.fallback_count(),
        "Scorer ready"
    );
    Ok(RiskScorer::new(index, cache))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StopsFile {
    Bare(Vec<StopQuery>),
    Wrapped { stops: Vec<StopQuery> },
}

/// Parses a stops file: either `[{lat, lon}, ...]` or `{"stops": [...]}`.
pub fn parse_stops(content: &str) -> Result<Vec<StopQuery>> {
    let stops = match serde_json::from_str::<StopsFile>(content)? {
        StopsFile::Bare(stops) => stops,
        StopsFile::Wrapped { stops } => stops,
    };
    Ok(stops)
}

pub fn load_stops(path: &str) -> Result<Vec<StopQuery>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    parse_stops(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_array() {
        let stops = parse_stops(r#"[{"lat": 9.7, "lon": 76.7}, {"lat": "bad"}]"#).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].lat, Some(json!(9.7)));
        assert_eq!(stops[1].lon, None);
    }

    #[test]
    fn test_parse_wrapped_object() {
        let stops = parse_stops(r#"{"stops": [{"lat": 1, "lon": 2}]}"#).unwrap();
        assert_eq!(stops.len(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_stops("42").is_err());
    }
}
