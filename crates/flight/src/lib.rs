//! Flight protocol layer.
//!
//! Maintains a live view of vehicle state and issues commands over an
//! abstract bidirectional link, hiding the underlying telemetry/command
//! protocol and radio from the mission layer. Retry policy belongs to
//! callers; this layer reports each failure exactly once.

pub mod controller;
pub mod error;
pub mod link;
pub mod modes;
pub mod sim;
pub mod telemetry;

pub use controller::{FlightController, DEFAULT_WAYPOINT_TOLERANCE_M};
pub use error::FlightError;
pub use link::{AckResult, CommandId, LinkMessage, VehicleCommand, VehicleLink};
pub use modes::FlightMode;
pub use sim::{SimHandle, SimulatedVehicle};
pub use telemetry::{TelemetryState, TelemetryStore};
