//! Weather station dataset and nearest-station lookup.
//!
//! [`StationDataset`] parses a station table whose column names vary between
//! sources. [`WeatherIndex`] answers "which station is closest to this stop".

mod index;
mod station;

pub use index::{LookupMode, WeatherIndex};
pub use station::{
    DEFAULT_PRECIPITATION_MM, DEFAULT_VISIBILITY_KM, StationDataset, WeatherStationRecord,
};
