use flate2::read::GzDecoder;
use std::path::Path;
use tracing::{debug, info, warn};

use super::station::{StationDataset, WeatherStationRecord};
use crate::config::ColumnConfig;
use crate::error::{Error, Result};
use crate::geo::Coordinate;

/// How [`WeatherIndex::nearest`] picks a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Haversine ranking over every station with coordinates.
    Spatial,
    /// No usable coordinates: always the first loaded row.
    Fallback,
}

/// Read-only nearest-station lookup over the loaded dataset.
#[derive(Debug, Clone)]
pub struct WeatherIndex {
    records: Vec<WeatherStationRecord>,
    mode: LookupMode,
}

impl WeatherIndex {
    /// Builds the index. An empty dataset has no fallback row and is rejected.
    pub fn new(dataset: StationDataset) -> Result<Self> {
        if dataset.records.is_empty() {
            return Err(Error::DataUnavailable(
                "station dataset has no rows".to_string(),
            ));
        }

        let placed = dataset
            .records
            .iter()
            .filter(|r| r.coordinate().is_some())
            .count();

        let mode = if dataset.has_coordinates && placed > 0 {
            LookupMode::Spatial
        } else {
            warn!(
                stations = dataset.records.len(),
                "Station coordinates unavailable, every lookup returns the first station"
            );
            LookupMode::Fallback
        };

        info!(stations = dataset.records.len(), placed, ?mode, "Weather index ready");

        Ok(Self {
            records: dataset.records,
            mode,
        })
    }

    /// Parses CSV bytes, gunzipping first when `name` ends in `.gz`.
    pub fn from_bytes(bytes: &[u8], name: &str, columns: &ColumnConfig) -> Result<Self> {
        let dataset = if name.ends_with(".gz") {
            debug!(name, "Decompressing gzip station dataset");
            StationDataset::from_csv_reader(GzDecoder::new(bytes), columns)?
        } else {
            StationDataset::from_csv_reader(bytes, columns)?
        };
        Self::new(dataset)
    }

    /// Loads a local CSV (optionally `.gz`) station file.
    pub fn load(path: impl AsRef<Path>, columns: &ColumnConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, &path.to_string_lossy(), columns)
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the station closest to `point`.
    ///
    /// Ties resolve to the earliest station in dataset order.
    pub fn nearest(&self, point: &Coordinate) -> &WeatherStationRecord {
        let fallback = &self.records[0];
        if self.mode == LookupMode::Fallback {
            return fallback;
        }

        let mut best: Option<(&WeatherStationRecord, f64)> = None;
        for record in &self.records {
            let Some(station) = record.coordinate() else {
                continue;
            };
            let d = point.distance_km(&station);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((record, d)),
            }
        }

        best.map(|(r, _)| r).unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::io::Write;

    fn station(lat: f64, lon: f64, rain: f64) -> WeatherStationRecord {
        WeatherStationRecord {
            latitude: Some(lat),
            longitude: Some(lon),
            precipitation_mm: Some(rain),
            visibility_km: None,
        }
    }

    fn at(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let result = WeatherIndex::new(StationDataset::default());
        assert!(matches!(result, Err(Error::DataUnavailable(_))));
    }

    #[test]
    fn test_nearest_picks_closest_station() {
        let idx = WeatherIndex::new(StationDataset::new(
            vec![station(0.0, 0.0, 1.0), station(10.0, 10.0, 2.0), station(20.0, 20.0, 3.0)],
            true,
        ))
        .unwrap();

        assert_eq!(idx.mode(), LookupMode::Spatial);
        assert_eq!(idx.nearest(&at(9.0, 9.5)).precipitation(), 2.0);
        assert_eq!(idx.nearest(&at(19.0, 21.0)).precipitation(), 3.0);
        assert_eq!(idx.nearest(&at(-5.0, -5.0)).precipitation(), 1.0);
    }

    #[test]
    fn test_ties_resolve_to_first_in_dataset_order() {
        let idx = WeatherIndex::new(StationDataset::new(
            vec![station(1.0, 0.0, 1.0), station(-1.0, 0.0, 2.0), station(1.0, 0.0, 3.0)],
            true,
        ))
        .unwrap();

        assert_eq!(idx.nearest(&at(0.0, 0.0)).precipitation(), 1.0);
        assert_eq!(idx.nearest(&at(1.0, 0.0)).precipitation(), 1.0);
    }

    #[test]
    fn test_fallback_mode_returns_first_row() {
        let mut records = vec![station(0.0, 0.0, 4.0), station(50.0, 50.0, 5.0)];
        for r in &mut records {
            r.latitude = None;
            r.longitude = None;
        }
        let idx = WeatherIndex::new(StationDataset::new(records, false)).unwrap();

        assert_eq!(idx.mode(), LookupMode::Fallback);
        assert_eq!(idx.nearest(&at(50.0, 50.0)).precipitation(), 4.0);
        assert_eq!(idx.nearest(&at(-80.0, 170.0)).precipitation(), 4.0);
    }

    #[test]
    fn test_coordinate_columns_without_values_fall_back() {
        let csv = b"lat,lon,precip\nx,y,4\n,,9\n";
        let idx = WeatherIndex::from_bytes(csv, "stations.csv", &ColumnConfig::default()).unwrap();

        assert_eq!(idx.mode(), LookupMode::Fallback);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.nearest(&at(9.7, 76.7)).precipitation(), 4.0);
        assert_eq!(idx.nearest(&at(-33.9, 151.2)).precipitation(), 4.0);
    }

    #[test]
    fn test_unplaced_rows_are_skipped() {
        let mut unplaced = station(0.0, 0.0, 9.0);
        unplaced.longitude = None;
        let idx = WeatherIndex::new(StationDataset::new(
            vec![unplaced, station(30.0, 30.0, 6.0)],
            true,
        ))
        .unwrap();

        assert_eq!(idx.nearest(&at(0.0, 0.0)).precipitation(), 6.0);
    }

    #[test]
    fn test_load_gzip_file() {
        let path = format!("{}/route_risk_test_stations.csv.gz", env::temp_dir().display());
        let _ = fs::remove_file(&path);

        let file = fs::File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder
            .write_all(b"lat,lon,precip,visibility\n9.7,76.7,22.0,2.0\n")
            .unwrap();
        encoder.finish().unwrap();

        let idx = WeatherIndex::load(&path, &ColumnConfig::default()).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.nearest(&at(9.7, 76.7)).visibility(), 2.0);

        fs::remove_file(&path).unwrap();
    }
}
