//! Vehicle link boundary: protocol messages, commands, acknowledgements.
//!
//! The physical link (serial radio, UDP, in-process simulator) lives
//! behind [`VehicleLink`]. `recv` is non-blocking; callers drain in a
//! polling loop.

use crate::error::FlightError;
use crate::modes::FlightMode;

/// Stable command identifiers used for acknowledgement matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    SetMode,
    ArmDisarm,
    Takeoff,
    SetPositionTarget,
    ChangeSpeed,
}

/// Commands issued to the vehicle.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    SetMode(FlightMode),
    Arm,
    Disarm,
    Takeoff { altitude_m: f64 },
    Goto { lat: f64, lon: f64, alt_m: f64 },
    SetSpeed { speed_ms: f64 },
}

impl VehicleCommand {
    /// The id an acknowledgement for this command will carry.
    pub fn id(&self) -> CommandId {
        match self {
            VehicleCommand::SetMode(_) => CommandId::SetMode,
            VehicleCommand::Arm | VehicleCommand::Disarm => CommandId::ArmDisarm,
            VehicleCommand::Takeoff { .. } => CommandId::Takeoff,
            VehicleCommand::Goto { .. } => CommandId::SetPositionTarget,
            VehicleCommand::SetSpeed { .. } => CommandId::ChangeSpeed,
        }
    }
}

/// Acknowledgement outcome reported by the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckResult {
    Accepted,
    Rejected { code: u8 },
}

/// Inbound protocol messages. Each message updates a disjoint slice of
/// the telemetry snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkMessage {
    Heartbeat {
        armed: bool,
        mode: FlightMode,
    },
    GlobalPosition {
        lat: f64,
        lon: f64,
        alt_msl: f64,
        alt_rel: f64,
        vx: f64,
        vy: f64,
        vz: f64,
        heading: f64,
    },
    GpsStatus {
        fix_type: u8,
        satellites: u8,
    },
    SystemStatus {
        battery_pct: Option<u8>,
        battery_voltage: f64,
    },
    Attitude {
        roll: f64,
        pitch: f64,
        yaw: f64,
    },
    VfrHud {
        groundspeed: f64,
    },
    CommandAck {
        command: CommandId,
        result: AckResult,
    },
}

/// The external bidirectional vehicle link.
pub trait VehicleLink: Send {
    /// Open the underlying transport. Does not wait for traffic.
    fn open(&mut self) -> Result<(), FlightError>;

    /// Release the link.
    fn close(&mut self);

    /// Issue a command to the vehicle.
    fn send(&mut self, command: &VehicleCommand) -> Result<(), FlightError>;

    /// Fetch the next buffered message, if any. Never blocks.
    fn recv(&mut self) -> Option<LinkMessage>;
}
