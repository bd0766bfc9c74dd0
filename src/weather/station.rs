use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, warn};

use crate::config::ColumnConfig;
use crate::error::Result;
use crate::geo::Coordinate;

/// Precipitation used when a station has no usable reading.
pub const DEFAULT_PRECIPITATION_MM: f64 = 0.0;
/// Visibility used when a station has no usable reading.
pub const DEFAULT_VISIBILITY_KM: f64 = 10.0;

/// One row of the station dataset. Immutable after loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherStationRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub visibility_km: Option<f64>,
}

impl WeatherStationRecord {
    /// Precipitation in millimeters, `0.0` when absent.
    pub fn precipitation(&self) -> f64 {
        self.precipitation_mm.unwrap_or(DEFAULT_PRECIPITATION_MM)
    }

    /// Visibility in kilometers, `10.0` when absent.
    pub fn visibility(&self) -> f64 {
        self.visibility_km.unwrap_or(DEFAULT_VISIBILITY_KM)
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate {
            lat: self.latitude?,
            lon: self.longitude?,
        })
    }
}

/// Column lookup for one logical field, resolved once from the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FieldAccessor {
    primary: Option<usize>,
    keyword_columns: Vec<usize>,
}

impl FieldAccessor {
    /// Picks the first alias present in `headers`. When none is present, every
    /// header containing one of `keywords` becomes a candidate, in header order.
    pub(crate) fn resolve(headers: &[String], aliases: &[String], keywords: &[String]) -> Self {
        let primary = aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias));

        let keyword_columns = if primary.is_some() {
            Vec::new()
        } else {
            headers
                .iter()
                .enumerate()
                .filter(|(_, h)| keywords.iter().any(|kw| h.contains(kw.as_str())))
                .map(|(i, _)| i)
                .collect()
        };

        Self {
            primary,
            keyword_columns,
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.primary.is_some() || !self.keyword_columns.is_empty()
    }

    /// Reads the field from a row. A resolved primary column is authoritative:
    /// an unparseable cell there yields `None` rather than falling through.
    pub(crate) fn extract(&self, row: &StringRecord) -> Option<f64> {
        match self.primary {
            Some(i) => row.get(i).and_then(parse_cell),
            None => self
                .keyword_columns
                .iter()
                .find_map(|&i| row.get(i).and_then(parse_cell)),
        }
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// The full station table plus whether it carries usable coordinate columns.
#[derive(Debug, Clone, Default)]
pub struct StationDataset {
    pub records: Vec<WeatherStationRecord>,
    pub has_coordinates: bool,
}

impl StationDataset {
    pub fn new(records: Vec<WeatherStationRecord>, has_coordinates: bool) -> Self {
        Self {
            records,
            has_coordinates,
        }
    }

    /// Parses a CSV station table with loosely-named columns.
    ///
    /// Headers are lower-cased and trimmed before alias resolution.
    pub fn from_csv_reader<R: Read>(reader: R, columns: &ColumnConfig) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let lat = FieldAccessor::resolve(&headers, &columns.latitude, &[]);
        let lon = FieldAccessor::resolve(&headers, &columns.longitude, &[]);
        let precip = FieldAccessor::resolve(
            &headers,
            &columns.precipitation,
            &columns.precipitation_keywords,
        );
        let vis =
            FieldAccessor::resolve(&headers, &columns.visibility, &columns.visibility_keywords);

        let has_coordinates = lat.is_resolved() && lon.is_resolved();
        if !has_coordinates {
            warn!(?headers, "No latitude/longitude columns, nearest-station lookup disabled");
        }
        if !precip.is_resolved() {
            warn!(?headers, "No precipitation column, defaulting to 0.0 mm");
        }
        if !vis.is_resolved() {
            warn!(?headers, "No visibility column, defaulting to 10.0 km");
        }

        let mut records = Vec::new();
        let mut unplaced = 0usize;

        for result in rdr.records() {
            let row = result?;
            let (latitude, longitude) = if has_coordinates {
                (lat.extract(&row), lon.extract(&row))
            } else {
                (None, None)
            };
            if has_coordinates && (latitude.is_none() || longitude.is_none()) {
                unplaced += 1;
            }

            records.push(WeatherStationRecord {
                latitude,
                longitude,
                precipitation_mm: precip.extract(&row),
                visibility_km: vis.extract(&row),
            });
        }

        if unplaced > 0 {
            warn!(unplaced, "Stations without parseable coordinates are excluded from ranking");
        }
        debug!(stations = records.len(), has_coordinates, "Station dataset loaded");

        Ok(Self::new(records, has_coordinates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> StationDataset {
        StationDataset::from_csv_reader(csv.as_bytes(), &ColumnConfig::default()).unwrap()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_prefers_alias_order() {
        let h = headers(&["latitude", "lat"]);
        let acc = FieldAccessor::resolve(&h, &ColumnConfig::default().latitude, &[]);
        // "lat" is listed first among aliases, so it wins over "latitude".
        assert_eq!(acc.primary, Some(1));
    }

    #[test]
    fn test_resolve_falls_back_to_keywords() {
        let h = headers(&["city", "total_rain_mm", "precip_24h"]);
        let cols = ColumnConfig::default();
        let acc = FieldAccessor::resolve(&h, &cols.precipitation, &cols.precipitation_keywords);
        assert_eq!(acc.primary, None);
        assert_eq!(acc.keyword_columns, vec![1, 2]);
    }

    #[test]
    fn test_headers_are_normalized() {
        let ds = load(" Latitude ,LONGITUDE, Rainfall ,Visibility\n9.7,76.7,12.5,4\n");
        assert!(ds.has_coordinates);
        assert_eq!(
            ds.records[0],
            WeatherStationRecord {
                latitude: Some(9.7),
                longitude: Some(76.7),
                precipitation_mm: Some(12.5),
                visibility_km: Some(4.0),
            }
        );
    }

    #[test]
    fn test_keyword_scan_takes_first_parseable_column() {
        let ds = load("lat,lon,rain_flag,rain_mm,sight_km\n1,2,n/a,7.5,2.5\n");
        assert_eq!(ds.records[0].precipitation_mm, Some(7.5));
        assert_eq!(ds.records[0].visibility_km, Some(2.5));
    }

    #[test]
    fn test_primary_column_blank_uses_default() {
        let ds = load("lat,lon,precipitation,visibility\n1,2,,NaN\n");
        let r = &ds.records[0];
        assert_eq!(r.precipitation_mm, None);
        assert_eq!(r.visibility_km, None);
        assert_eq!(r.precipitation(), 0.0);
        assert_eq!(r.visibility(), 10.0);
    }

    #[test]
    fn test_missing_coordinate_columns() {
        let ds = load("station,precip\nKottayam,3.0\n");
        assert!(!ds.has_coordinates);
        assert_eq!(ds.records[0].coordinate(), None);
        assert_eq!(ds.records[0].precipitation(), 3.0);
    }

    #[test]
    fn test_custom_aliases() {
        let mut cols = ColumnConfig::default();
        cols.visibility = vec!["vis_km".to_string()];
        let ds = StationDataset::from_csv_reader(
            "lat,lon,vis_km,visibility\n1,2,3.5,9\n".as_bytes(),
            &cols,
        )
        .unwrap();
        assert_eq!(ds.records[0].visibility_km, Some(3.5));
    }
}
