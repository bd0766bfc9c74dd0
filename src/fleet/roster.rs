use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::tracker::ViewerScope;
use crate::error::{Error, Result};

/// What a caller is allowed to do with the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
            Role::Student => "student",
        })
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "driver" => Ok(Role::Driver),
            "student" => Ok(Role::Student),
            other => Err(Error::validation("role", format!("unknown role '{other}'"))),
        }
    }
}

/// Identity of the caller, supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub role: Role,
    #[serde(default)]
    pub email: String,
}

impl Viewer {
    pub fn new(role: Role, email: &str) -> Self {
        Self {
            role,
            email: email.to_string(),
        }
    }
}

/// One row of a published driver roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverAssignment {
    #[serde(default)]
    pub bus_id: String,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub driver_email: String,
}

/// One stop on a bus's drawn route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default)]
struct RosterState {
    drivers: HashMap<String, String>,
    driver_names: HashMap<String, String>,
    students: HashMap<String, String>,
    published: bool,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Who drives and who rides which bus.
///
/// Owned by the service for its whole lifetime. Assignments are replaced
/// wholesale on each publish; route geometry accumulates per bus.
#[derive(Debug, Default)]
pub struct AssignmentRoster {
    state: RwLock<RosterState>,
    routes: RwLock<BTreeMap<String, Vec<RouteStop>>>,
}

impl AssignmentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the roster and marks routes as published.
    ///
    /// Rows missing an email or bus id are dropped. Geometry for the buses in
    /// `route_geometry` overwrites what was stored for them; other buses keep
    /// theirs. Returns the number of drivers with an assignment.
    pub fn publish(
        &self,
        assignments: &[DriverAssignment],
        student_map: &HashMap<String, String>,
        route_geometry: &HashMap<String, Vec<RouteStop>>,
    ) -> Result<usize> {
        if assignments.is_empty() {
            return Err(Error::validation("assignments", "none provided"));
        }

        let mut drivers = HashMap::new();
        let mut driver_names = HashMap::new();
        for row in assignments {
            let email = normalize_email(&row.driver_email);
            if email.is_empty() {
                continue;
            }
            driver_names.insert(email.clone(), row.driver_name.trim().to_string());
            let bus_id = row.bus_id.trim();
            if !bus_id.is_empty() {
                drivers.insert(email, bus_id.to_string());
            }
        }

        let students: HashMap<String, String> = student_map
            .iter()
            .map(|(email, bus)| (normalize_email(email), bus.trim().to_string()))
            .filter(|(email, bus)| !email.is_empty() && !bus.is_empty())
            .collect();

        let assigned = drivers.len();
        let students_len = students.len();
        *self.state.write() = RosterState {
            drivers,
            driver_names,
            students,
            published: true,
        };

        let mut routes = self.routes.write();
        routes.extend(
            route_geometry
                .iter()
                .map(|(bus, stops)| (bus.trim().to_string(), stops.clone()))
                .filter(|(bus, _)| !bus.is_empty()),
        );
        info!(
            drivers = assigned,
            students = students_len,
            routes = routes.len(),
            "Roster published"
        );

        Ok(assigned)
    }

    pub fn is_published(&self) -> bool {
        self.state.read().published
    }

    pub fn driver_bus(&self, email: &str) -> Option<String> {
        self.state.read().drivers.get(&normalize_email(email)).cloned()
    }

    pub fn student_bus(&self, email: &str) -> Option<String> {
        self.state.read().students.get(&normalize_email(email)).cloned()
    }

    pub fn driver_name(&self, email: &str) -> Option<String> {
        self.state
            .read()
            .driver_names
            .get(&normalize_email(email))
            .cloned()
    }

    /// Stored stop geometry for every bus, keyed by bus id. Any role may read it.
    pub fn route_geometry(&self) -> BTreeMap<String, Vec<RouteStop>> {
        self.routes.read().clone()
    }

    /// Current driver assignments, sorted by bus id.
    pub fn assignments(&self) -> Vec<DriverAssignment> {
        let state = self.state.read();
        let mut rows: Vec<DriverAssignment> = state
            .drivers
            .iter()
            .map(|(email, bus)| DriverAssignment {
                bus_id: bus.clone(),
                driver_name: state.driver_names.get(email).cloned().unwrap_or_default(),
                driver_email: email.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.bus_id.cmp(&b.bus_id));
        rows
    }

    /// Bus a position update should be filed under.
    ///
    /// Drivers always report for their assigned bus; whatever id they send is
    /// ignored. Admins name the bus explicitly.
    pub fn resolve_update_target(&self, viewer: &Viewer, requested: Option<&str>) -> Result<String> {
        match viewer.role {
            Role::Driver => self
                .driver_bus(&viewer.email)
                .ok_or_else(|| Error::NotAssigned(viewer.email.clone())),
            Role::Admin => {
                let bus_id = requested.unwrap_or_default().trim();
                if bus_id.is_empty() {
                    Err(Error::validation("bus_id", "required"))
                } else {
                    Ok(bus_id.to_string())
                }
            }
            Role::Student => Err(Error::Forbidden("driver")),
        }
    }

    /// Bus a stop signal applies to. An empty id is allowed and removes nothing.
    pub fn resolve_stop_target(&self, viewer: &Viewer, requested: Option<&str>) -> Result<String> {
        match viewer.role {
            Role::Driver => Ok(self.driver_bus(&viewer.email).unwrap_or_default()),
            Role::Admin => Ok(requested.unwrap_or_default().trim().to_string()),
            Role::Student => Err(Error::Forbidden("driver")),
        }
    }

    /// Visibility for a live-status query.
    pub fn scope_for(&self, viewer: &Viewer) -> Result<ViewerScope> {
        match viewer.role {
            Role::Admin => Ok(ViewerScope::Unrestricted),
            Role::Student => {
                let assigned_bus = self.student_bus(&viewer.email);
                if assigned_bus.is_none() {
                    debug!(email = %viewer.email, "No bus assigned, showing all buses");
                }
                Ok(ViewerScope::Restricted { assigned_bus })
            }
            Role::Driver => Err(Error::Forbidden("student or admin")),
        }
    }
}
