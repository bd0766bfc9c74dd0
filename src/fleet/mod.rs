//! Live vehicle positions and who may see them.
//!
//! [`FleetTracker`] keeps the latest GPS ping per bus behind a single lock.
//! [`AssignmentRoster`] maps drivers and students to buses and turns a
//! [`Viewer`] into a [`ViewerScope`] for queries.

mod roster;
mod tracker;

pub use roster::{AssignmentRoster, DriverAssignment, Role, RouteStop, Viewer};
pub use tracker::{
    BusPosition, DEFAULT_FRESHNESS_WINDOW, FleetTracker, GpsUpdate, LiveBus, LiveStatus,
    StopReceipt, ViewerScope,
};
