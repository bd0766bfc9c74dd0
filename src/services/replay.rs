//! Scripted tracker sessions for the `replay` command.
//!
//! Each line of the script is one JSON event. Time only advances through
//! `wait` events, so a script replays identically every run.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

use route_risk::fleet::{
    AssignmentRoster, DriverAssignment, FleetTracker, GpsUpdate, LiveStatus, RouteStop, StopReceipt,
    Viewer,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ReplayEvent {
    Publish {
        assignments: Vec<DriverAssignment>,
        #[serde(default)]
        student_map: HashMap<String, String>,
        #[serde(default)]
        route_geometry: HashMap<String, Vec<RouteStop>>,
    },
    Update {
        viewer: Viewer,
        #[serde(flatten)]
        update: GpsUpdate,
    },
    Stop {
        viewer: Viewer,
        #[serde(default)]
        bus_id: Option<String>,
    },
    Status {
        viewer: Viewer,
    },
    Routes {
        viewer: Viewer,
    },
    Wait {
        secs: u64,
    },
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplayOutput {
    Published { ok: bool, assigned: usize },
    Updated { ok: bool, bus_id: String },
    Stopped { ok: bool, removed: String },
    Status(LiveStatus),
    Routes { routes: BTreeMap<String, Vec<RouteStop>> },
    Waited { elapsed_secs: u64 },
}

fn clock_overflow(secs: u64) -> route_risk::Error {
    route_risk::Error::Validation {
        field: "secs",
        reason: format!("clock cannot advance to {secs}s"),
    }
}

/// Roster and tracker plus a simulated clock.
pub struct ReplaySession {
    roster: AssignmentRoster,
    tracker: FleetTracker,
    start: Instant,
    offset: Duration,
}

impl ReplaySession {
    pub fn new(window: Duration) -> Self {
        Self {
            roster: AssignmentRoster::new(),
            tracker: FleetTracker::new(window),
            start: Instant::now(),
            offset: Duration::ZERO,
        }
    }

    fn now(&self) -> route_risk::Result<Instant> {
        self.start
            .checked_add(self.offset)
            .ok_or_else(|| clock_overflow(self.offset.as_secs()))
    }

    pub fn parse_line(line: &str) -> Result<ReplayEvent> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn apply(&mut self, event: ReplayEvent) -> route_risk::Result<ReplayOutput> {
        match event {
            ReplayEvent::Publish {
                assignments,
                student_map,
                route_geometry,
            } => {
                let assigned = self
                    .roster
                    .publish(&assignments, &student_map, &route_geometry)?;
                Ok(ReplayOutput::Published { ok: true, assigned })
            }
            ReplayEvent::Update { viewer, update } => {
                let bus_id = self
                    .roster
                    .resolve_update_target(&viewer, update.bus_id.as_deref())?;
                let bus_id = self.tracker.upsert_at(&bus_id, &update, self.now()?)?;
                Ok(ReplayOutput::Updated { ok: true, bus_id })
            }
            ReplayEvent::Stop { viewer, bus_id } => {
                let target = self.roster.resolve_stop_target(&viewer, bus_id.as_deref())?;
                let StopReceipt { removed, .. } = self.tracker.remove(&target);
                Ok(ReplayOutput::Stopped { ok: true, removed })
            }
            ReplayEvent::Status { viewer } => {
                let scope = self.roster.scope_for(&viewer)?;
                Ok(ReplayOutput::Status(self.tracker.query(self.now()?, &scope).into()))
            }
            ReplayEvent::Routes { viewer } => {
                debug!(role = %viewer.role, "Route geometry requested");
                Ok(ReplayOutput::Routes {
                    routes: self.roster.route_geometry(),
                })
            }
            ReplayEvent::Wait { secs } => {
                let offset = self
                    .offset
                    .checked_add(Duration::from_secs(secs))
                    .filter(|offset| self.start.checked_add(*offset).is_some())
                    .ok_or_else(|| clock_overflow(secs))?;
                self.offset = offset;
                Ok(ReplayOutput::Waited {
                    elapsed_secs: self.offset.as_secs(),
                })
            }
        }
    }
}
