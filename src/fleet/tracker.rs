use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geo::{Coordinate, number_from_value};

/// Positions older than this are hidden from queries.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// A GPS ping as received from a driver device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpsUpdate {
    #[serde(default)]
    pub bus_id: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
    #[serde(default)]
    pub speed: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl GpsUpdate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(Value::from(lat)),
            lon: Some(Value::from(lon)),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(Value::from(speed));
        self
    }

    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(Value::from(timestamp));
        self
    }
}

/// Last known position of one bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusPosition {
    pub bus_id: String,
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
    /// Device-reported time, stored verbatim.
    pub timestamp: String,
    #[serde(skip)]
    pub last_seen: Instant,
}

/// A fresh position as returned to viewers, with its age in whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveBus {
    pub bus_id: String,
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
    pub timestamp: String,
    #[serde(rename = "last_seen")]
    pub age_secs: u64,
}

/// Live-status response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub buses: Vec<LiveBus>,
    pub count: usize,
}

impl From<Vec<LiveBus>> for LiveStatus {
    fn from(buses: Vec<LiveBus>) -> Self {
        let count = buses.len();
        Self { buses, count }
    }
}

/// Result of a stop signal. `removed` echoes the requested id, even when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReceipt {
    pub removed: String,
    pub was_active: bool,
}

/// Which positions a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerScope {
    Unrestricted,
    /// Only the assigned bus. With no assignment the viewer sees everything.
    Restricted { assigned_bus: Option<String> },
}

impl ViewerScope {
    fn admits(&self, bus_id: &str) -> bool {
        match self {
            ViewerScope::Unrestricted => true,
            ViewerScope::Restricted { assigned_bus: None } => true,
            ViewerScope::Restricted {
                assigned_bus: Some(assigned),
            } => assigned == bus_id,
        }
    }
}

/// In-memory map of bus id to last known position.
///
/// One coarse lock guards the whole map; every operation is short and
/// never blocks on I/O.
#[derive(Debug)]
pub struct FleetTracker {
    positions: Mutex<HashMap<String, BusPosition>>,
    window: Duration,
}

impl Default for FleetTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS_WINDOW)
    }
}

impl FleetTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            positions: Mutex::new(HashMap::new()),
            window,
        }
    }

    pub fn freshness_window(&self) -> Duration {
        self.window
    }

    pub fn upsert(&self, bus_id: &str, update: &GpsUpdate) -> Result<String> {
        self.upsert_at(bus_id, update, Instant::now())
    }

    /// Replaces the position for `bus_id`, stamping it with `seen_at`.
    ///
    /// Returns the stored bus id. Invalid input leaves the map untouched.
    pub fn upsert_at(&self, bus_id: &str, update: &GpsUpdate, seen_at: Instant) -> Result<String> {
        let bus_id = bus_id.trim();
        if bus_id.is_empty() {
            return Err(Error::validation("bus_id", "required"));
        }

        let point = Coordinate::from_values(update.lat.as_ref(), update.lon.as_ref())?;
        let speed = match &update.speed {
            None | Some(Value::Null) => 0.0,
            Some(v) => number_from_value(v)
                .ok_or_else(|| Error::validation("speed", format!("{v} is not a number")))?,
        };
        let timestamp = match &update.timestamp {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let position = BusPosition {
            bus_id: bus_id.to_string(),
            lat: point.lat,
            lon: point.lon,
            speed,
            timestamp,
            last_seen: seen_at,
        };

        let replaced = self
            .positions
            .lock()
            .insert(bus_id.to_string(), position)
            .is_some();
        debug!(bus_id, lat = point.lat, lon = point.lon, speed, replaced, "Position updated");

        Ok(bus_id.to_string())
    }

    /// Deletes the entry for `bus_id` if present. Always succeeds.
    pub fn remove(&self, bus_id: &str) -> StopReceipt {
        let bus_id = bus_id.trim();
        let was_active = !bus_id.is_empty() && self.positions.lock().remove(bus_id).is_some();
        info!(bus_id, was_active, "Tracking stopped");
        StopReceipt {
            removed: bus_id.to_string(),
            was_active,
        }
    }

    pub fn query_now(&self, scope: &ViewerScope) -> Vec<LiveBus> {
        self.query(Instant::now(), scope)
    }

    /// Fresh positions visible to `scope`, sorted by bus id.
    ///
    /// An entry is fresh while `now - last_seen <= window`. Stale entries stay
    /// in the map until replaced or removed.
    pub fn query(&self, now: Instant, scope: &ViewerScope) -> Vec<LiveBus> {
        let mut buses: Vec<LiveBus> = {
            let positions = self.positions.lock();
            positions
                .values()
                .filter(|p| scope.admits(&p.bus_id))
                .filter_map(|p| {
                    let age = now.saturating_duration_since(p.last_seen);
                    (age <= self.window).then(|| LiveBus {
                        bus_id: p.bus_id.clone(),
                        lat: p.lat,
                        lon: p.lon,
                        speed: p.speed,
                        timestamp: p.timestamp.clone(),
                        age_secs: age.as_secs_f64().round() as u64,
                    })
                })
                .collect()
        };
        buses.sort_by(|a, b| a.bus_id.cmp(&b.bus_id));
        buses
    }

    pub fn get(&self, bus_id: &str) -> Option<BusPosition> {
        self.positions.lock().get(bus_id).cloned()
    }

    /// Entries held, fresh or stale.
    pub fn len(&self) -> usize {
        self.positions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_upsert_and_query() {
        let tracker = FleetTracker::default();
        let t0 = Instant::now();
        let update = GpsUpdate::new(9.72, 76.68)
            .with_speed(32.5)
            .with_timestamp("2026-10-18T08:00:00Z");

        assert_eq!(tracker.upsert_at(" BUS-1 ", &update, t0).unwrap(), "BUS-1");

        let live = tracker.query(t0 + secs(2), &ViewerScope::Unrestricted);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].bus_id, "BUS-1");
        assert_eq!(live[0].speed, 32.5);
        assert_eq!(live[0].timestamp, "2026-10-18T08:00:00Z");
        assert_eq!(live[0].age_secs, 2);
    }

    #[test]
    fn test_repeat_upsert_replaces_entry() {
        let tracker = FleetTracker::default();
        let t0 = Instant::now();
        tracker.upsert_at("B1", &GpsUpdate::new(1.0, 1.0), t0).unwrap();
        tracker
            .upsert_at("B1", &GpsUpdate::new(1.0, 1.0), t0 + secs(20))
            .unwrap();

        assert_eq!(tracker.len(), 1);
        let live = tracker.query(t0 + secs(20), &ViewerScope::Unrestricted);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].age_secs, 0);
    }

    #[test]
    fn test_freshness_window() {
        let tracker = FleetTracker::default();
        let t0 = Instant::now();
        tracker.upsert_at("B1", &GpsUpdate::new(1.0, 1.0), t0).unwrap();

        let at_29 = tracker.query(t0 + secs(29), &ViewerScope::Unrestricted);
        assert_eq!(at_29.len(), 1);
        assert_eq!(at_29[0].age_secs, 29);

        assert_eq!(tracker.query(t0 + secs(30), &ViewerScope::Unrestricted).len(), 1);
        assert!(tracker.query(t0 + secs(31), &ViewerScope::Unrestricted).is_empty());
        // Aging hides the entry but does not delete it.
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_invalid_update_leaves_state_untouched() {
        let tracker = FleetTracker::default();
        let t0 = Instant::now();
        tracker.upsert_at("B1", &GpsUpdate::new(1.0, 1.0), t0).unwrap();

        let missing_lat = GpsUpdate {
            lon: Some(json!(2.0)),
            ..Default::default()
        };
        assert!(tracker.upsert_at("B1", &missing_lat, t0 + secs(1)).is_err());

        let bad_speed = GpsUpdate::new(2.0, 2.0);
        let bad_speed = GpsUpdate {
            speed: Some(json!("fast")),
            ..bad_speed
        };
        assert!(matches!(
            tracker.upsert_at("B1", &bad_speed, t0 + secs(1)),
            Err(Error::Validation { field: "speed", .. })
        ));

        assert!(tracker.upsert_at("  ", &GpsUpdate::new(2.0, 2.0), t0).is_err());

        let kept = tracker.get("B1").unwrap();
        assert_eq!((kept.lat, kept.lon), (1.0, 1.0));
        assert_eq!(kept.last_seen, t0);
    }

    #[test]
    fn test_speed_defaults_to_zero_and_numeric_strings_parse() {
        let tracker = FleetTracker::default();
        let update = GpsUpdate {
            lat: Some(json!("9.5")),
            lon: Some(json!("76.5")),
            timestamp: Some(json!(1760774400)),
            ..Default::default()
        };
        tracker.upsert("B2", &update).unwrap();

        let pos = tracker.get("B2").unwrap();
        assert_eq!(pos.speed, 0.0);
        assert_eq!(pos.lat, 9.5);
        assert_eq!(pos.timestamp, "1760774400");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let tracker = FleetTracker::default();
        let t0 = Instant::now();
        tracker.upsert_at("B1", &GpsUpdate::new(1.0, 1.0), t0).unwrap();

        let first = tracker.remove("B1");
        assert_eq!(first, StopReceipt { removed: "B1".into(), was_active: true });
        assert!(tracker.query(t0, &ViewerScope::Unrestricted).is_empty());

        let again = tracker.remove("B1");
        assert_eq!(again, StopReceipt { removed: "B1".into(), was_active: false });

        let empty = tracker.remove("");
        assert_eq!(empty.removed, "");
        assert!(!empty.was_active);
    }

    #[test]
    fn test_restricted_scope() {
        let tracker = FleetTracker::default();
        let t0 = Instant::now();
        for id in ["A", "B", "C"] {
            tracker.upsert_at(id, &GpsUpdate::new(1.0, 1.0), t0).unwrap();
        }

        let only_b = ViewerScope::Restricted {
            assigned_bus: Some("B".to_string()),
        };
        let live = tracker.query(t0, &only_b);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].bus_id, "B");

        let unassigned = ViewerScope::Restricted { assigned_bus: None };
        let ids: Vec<_> = tracker
            .query(t0, &unassigned)
            .into_iter()
            .map(|b| b.bus_id)
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);

        let stale_b = tracker.query(t0 + secs(31), &only_b);
        assert!(stale_b.is_empty());
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = Arc::new(FleetTracker::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let id = format!("BUS-{}", i % 4);
                        tracker
                            .upsert(&id, &GpsUpdate::new(n as f64 / 10.0, 1.0))
                            .unwrap();
                        tracker.query_now(&ViewerScope::Unrestricted);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn test_live_status_count() {
        let status = LiveStatus::from(vec![]);
        assert_eq!(status.count, 0);
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v, json!({ "buses": [], "count": 0 }));
    }
}
