use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rainfall above this (mm) is `rainy`.
pub const RAINY_ABOVE_MM: f64 = 20.0;
/// Rainfall above this (mm) is at least `cloudy`.
pub const CLOUDY_ABOVE_MM: f64 = 5.0;
/// Rainfall above this (mm) makes the road `wet`.
pub const WET_ROAD_ABOVE_MM: f64 = 10.0;
/// Visibility below this (km) counts as `night`.
pub const NIGHT_BELOW_KM: f64 = 3.0;

macro_rules! category {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($label => Ok($name::$variant),)+
                    other => Err(format!("unknown {} category '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

category!(
    /// Sky condition derived from rainfall.
    WeatherCategory { Clear => "clear", Cloudy => "cloudy", Rainy => "rainy" }
);
category!(
    /// Road surface derived from rainfall.
    RoadCategory { Dry => "dry", Wet => "wet" }
);
category!(
    /// Light condition derived from visibility.
    LightingCategory { Day => "day", Night => "night" }
);

impl WeatherCategory {
    pub fn from_rainfall(rainfall_mm: f64) -> Self {
        if rainfall_mm > RAINY_ABOVE_MM {
            WeatherCategory::Rainy
        } else if rainfall_mm > CLOUDY_ABOVE_MM {
            WeatherCategory::Cloudy
        } else {
            WeatherCategory::Clear
        }
    }
}

impl RoadCategory {
    pub fn from_rainfall(rainfall_mm: f64) -> Self {
        if rainfall_mm > WET_ROAD_ABOVE_MM {
            RoadCategory::Wet
        } else {
            RoadCategory::Dry
        }
    }
}

impl LightingCategory {
    pub fn from_visibility(visibility_km: f64) -> Self {
        if visibility_km < NIGHT_BELOW_KM {
            LightingCategory::Night
        } else {
            LightingCategory::Day
        }
    }
}

/// The `(weather, road, lighting)` key of the risk cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryTriple {
    pub weather: WeatherCategory,
    pub road: RoadCategory,
    pub lighting: LightingCategory,
}

impl CategoryTriple {
    pub fn new(weather: WeatherCategory, road: RoadCategory, lighting: LightingCategory) -> Self {
        Self {
            weather,
            road,
            lighting,
        }
    }

    /// Classifies a station reading. Total over all inputs.
    pub fn classify(rainfall_mm: f64, visibility_km: f64) -> Self {
        Self::new(
            WeatherCategory::from_rainfall(rainfall_mm),
            RoadCategory::from_rainfall(rainfall_mm),
            LightingCategory::from_visibility(visibility_km),
        )
    }

    /// Parses three labels; `None` if any is unrecognized.
    pub fn parse(weather: &str, road: &str, lighting: &str) -> Option<Self> {
        Some(Self::new(
            weather.parse().ok()?,
            road.parse().ok()?,
            lighting.parse().ok()?,
        ))
    }

    /// All 12 combinations, weather-major.
    pub fn all() -> impl Iterator<Item = CategoryTriple> {
        WeatherCategory::ALL.iter().flat_map(|&w| {
            RoadCategory::ALL.iter().flat_map(move |&r| {
                LightingCategory::ALL
                    .iter()
                    .map(move |&l| CategoryTriple::new(w, r, l))
            })
        })
    }
}

impl fmt::Display for CategoryTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.weather, self.road, self.lighting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_thresholds() {
        assert_eq!(WeatherCategory::from_rainfall(25.0), WeatherCategory::Rainy);
        assert_eq!(WeatherCategory::from_rainfall(20.0), WeatherCategory::Cloudy);
        assert_eq!(WeatherCategory::from_rainfall(8.0), WeatherCategory::Cloudy);
        assert_eq!(WeatherCategory::from_rainfall(5.0), WeatherCategory::Clear);
        assert_eq!(WeatherCategory::from_rainfall(3.0), WeatherCategory::Clear);
    }

    #[test]
    fn test_road_thresholds() {
        assert_eq!(RoadCategory::from_rainfall(25.0), RoadCategory::Wet);
        assert_eq!(RoadCategory::from_rainfall(10.0), RoadCategory::Dry);
        assert_eq!(RoadCategory::from_rainfall(3.0), RoadCategory::Dry);
    }

    #[test]
    fn test_lighting_thresholds() {
        assert_eq!(LightingCategory::from_visibility(2.0), LightingCategory::Night);
        assert_eq!(LightingCategory::from_visibility(3.0), LightingCategory::Day);
        assert_eq!(LightingCategory::from_visibility(5.0), LightingCategory::Day);
    }

    #[test]
    fn test_classify() {
        let t = CategoryTriple::classify(8.0, 10.0);
        assert_eq!(t.weather, WeatherCategory::Cloudy);
        assert_eq!(t.road, RoadCategory::Dry);
        assert_eq!(t.lighting, LightingCategory::Day);

        let t = CategoryTriple::classify(12.0, 1.0);
        assert_eq!(t.to_string(), "(cloudy, wet, night)");
    }

    #[test]
    fn test_all_has_twelve_distinct() {
        let all: Vec<_> = CategoryTriple::all().collect();
        assert_eq!(all.len(), 12);
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 12);
        assert_eq!(
            all[0],
            CategoryTriple::new(WeatherCategory::Clear, RoadCategory::Dry, LightingCategory::Day)
        );
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(
            CategoryTriple::parse("Rainy", " wet", "NIGHT"),
            Some(CategoryTriple::new(
                WeatherCategory::Rainy,
                RoadCategory::Wet,
                LightingCategory::Night
            ))
        );
        assert_eq!(CategoryTriple::parse("foggy", "wet", "night"), None);
    }
}
