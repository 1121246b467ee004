//! High-level vehicle control over a [`VehicleLink`].
//!
//! Connection requires a first heartbeat within the configured timeout
//! and is not retried internally; retry policy belongs to the caller.
//! Command rejections and ack timeouts are reported per call and never
//! corrupt the telemetry snapshot.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::FlightError;
use crate::link::{AckResult, CommandId, LinkMessage, VehicleCommand, VehicleLink};
use crate::modes::FlightMode;
use crate::telemetry::{TelemetryState, TelemetryStore};

/// Default arrival tolerance for waypoint tests, meters.
pub const DEFAULT_WAYPOINT_TOLERANCE_M: f64 = 2.0;

const MODE_CONFIRM_ATTEMPTS: u32 = 10;
const MODE_CONFIRM_INTERVAL: Duration = Duration::from_millis(200);
const ACK_POLL_INTERVAL: Duration = Duration::from_millis(50);
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Interface to the flight controller over the telemetry/command link.
pub struct FlightController {
    link: Box<dyn VehicleLink>,
    telemetry: TelemetryStore,
    connected: bool,
    heartbeat_timeout: Duration,
    ack_timeout: Duration,
}

impl FlightController {
    pub fn new(
        link: Box<dyn VehicleLink>,
        heartbeat_timeout: Duration,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            link,
            telemetry: TelemetryStore::new(),
            connected: false,
            heartbeat_timeout,
            ack_timeout,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Snapshot of current telemetry.
    pub fn telemetry(&self) -> TelemetryState {
        self.telemetry.snapshot()
    }

    /// Current (lat, lon, alt_rel).
    pub fn location(&self) -> (f64, f64, f64) {
        self.telemetry.location()
    }

    /// Open the link and wait for the first heartbeat.
    pub fn connect(&mut self) -> Result<(), FlightError> {
        self.link.open()?;
        let deadline = Instant::now() + self.heartbeat_timeout;
        loop {
            self.drain_telemetry();
            if self.telemetry.snapshot().connected {
                self.connected = true;
                info!("connected to vehicle");
                return Ok(());
            }
            if Instant::now() >= deadline {
                let timeout_ms = self.heartbeat_timeout.as_millis() as u64;
                warn!(timeout_ms, "no heartbeat from vehicle");
                return Err(FlightError::ConnectionFailure { timeout_ms });
            }
            std::thread::sleep(CONNECT_POLL_INTERVAL);
        }
    }

    /// Process all currently buffered messages. Never blocks.
    pub fn drain_telemetry(&mut self) {
        while let Some(message) = self.link.recv() {
            self.telemetry.apply(&message);
        }
    }

    /// Request a mode change and poll telemetry until it is reported.
    pub fn set_mode(&mut self, mode: FlightMode) -> Result<(), FlightError> {
        self.require_connected()?;
        self.link.send(&VehicleCommand::SetMode(mode))?;
        for _ in 0..MODE_CONFIRM_ATTEMPTS {
            self.drain_telemetry();
            if self.telemetry.snapshot().mode == Some(mode) {
                debug!(mode = %mode, "mode confirmed");
                return Ok(());
            }
            std::thread::sleep(MODE_CONFIRM_INTERVAL);
        }
        warn!(mode = %mode, "mode change not confirmed");
        Err(FlightError::ModeChangeUnconfirmed { requested: mode })
    }

    /// Arm the motors. Blocks on the acknowledgement handshake.
    pub fn arm(&mut self) -> Result<(), FlightError> {
        self.require_connected()?;
        self.link.send(&VehicleCommand::Arm)?;
        self.wait_for_ack(CommandId::ArmDisarm)
    }

    /// Disarm the motors.
    pub fn disarm(&mut self) -> Result<(), FlightError> {
        self.require_connected()?;
        self.link.send(&VehicleCommand::Disarm)?;
        self.wait_for_ack(CommandId::ArmDisarm)
    }

    /// Command a takeoff to the given relative altitude.
    pub fn takeoff(&mut self, altitude_m: f64) -> Result<(), FlightError> {
        self.require_connected()?;
        self.link.send(&VehicleCommand::Takeoff { altitude_m })?;
        info!(altitude_m, "takeoff command sent");
        self.wait_for_ack(CommandId::Takeoff)
    }

    /// Issue a position target. Does not wait for arrival.
    pub fn goto(&mut self, lat: f64, lon: f64, alt_m: f64) -> Result<(), FlightError> {
        self.require_connected()?;
        self.link.send(&VehicleCommand::Goto { lat, lon, alt_m })?;
        debug!(lat, lon, alt_m, "position target sent");
        Ok(())
    }

    /// Set the target groundspeed.
    pub fn set_speed(&mut self, speed_ms: f64) -> Result<(), FlightError> {
        self.require_connected()?;
        self.link.send(&VehicleCommand::SetSpeed { speed_ms })
    }

    /// Return to launch.
    pub fn rtl(&mut self) -> Result<(), FlightError> {
        self.set_mode(FlightMode::Rtl)
    }

    /// Switch to landing.
    pub fn land(&mut self) -> Result<(), FlightError> {
        self.set_mode(FlightMode::Land)
    }

    /// True when the vehicle is within `tolerance_m` of the target.
    pub fn reached_waypoint(&self, lat: f64, lon: f64, tolerance_m: f64) -> bool {
        let state = self.telemetry.snapshot();
        haversine_m(state.lat, state.lon, lat, lon) <= tolerance_m
    }

    /// Release the link and mark telemetry disconnected.
    pub fn disconnect(&mut self) {
        self.link.close();
        self.connected = false;
        self.telemetry.set_connected(false);
        info!("disconnected from vehicle");
    }

    fn require_connected(&self) -> Result<(), FlightError> {
        if self.connected {
            Ok(())
        } else {
            Err(FlightError::NotConnected)
        }
    }

    /// Consume messages until a matching acknowledgement arrives or the
    /// timeout elapses. Non-ack messages are applied to telemetry so the
    /// snapshot keeps moving while we wait.
    fn wait_for_ack(&mut self, command: CommandId) -> Result<(), FlightError> {
        let deadline = Instant::now() + self.ack_timeout;
        loop {
            while let Some(message) = self.link.recv() {
                if let LinkMessage::CommandAck { command: acked, result } = message {
                    if acked == command {
                        return match result {
                            AckResult::Accepted => Ok(()),
                            AckResult::Rejected { code } => {
                                warn!(?command, code, "command rejected");
                                Err(FlightError::CommandRejected { command, code })
                            }
                        };
                    }
                } else {
                    self.telemetry.apply(&message);
                }
            }
            if Instant::now() >= deadline {
                warn!(?command, "timed out waiting for acknowledgement");
                return Err(FlightError::AckTimeout { command });
            }
            std::thread::sleep(ACK_POLL_INTERVAL);
        }
    }
}

/// Great-circle distance between two coordinates, meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
