//! Telemetry snapshot container.
//!
//! One mutable snapshot owned by the protocol layer, overwritten
//! field-by-field as messages arrive. Each message's fields are applied
//! as a single atomic update; readers always get a complete copy.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::link::LinkMessage;
use crate::modes::FlightMode;

/// Current vehicle state as reported over the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryState {
    // Position
    pub lat: f64,
    pub lon: f64,
    /// Meters above sea level.
    pub alt_msl: f64,
    /// Meters above home/takeoff.
    pub alt_rel: f64,

    // Attitude, degrees
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,

    // Velocity, m/s
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub groundspeed: f64,

    // System
    pub battery_pct: Option<u8>,
    pub battery_voltage: f64,
    pub armed: bool,
    pub mode: Option<FlightMode>,
    /// 0 = no fix, 2 = 2D, 3 = 3D.
    pub gps_fix: u8,
    pub gps_satellites: u8,

    // Link health
    pub connected: bool,
    pub last_heartbeat_ms: Option<u64>,

    /// Unix milliseconds of the last applied update.
    pub updated_at_ms: u64,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            alt_msl: 0.0,
            alt_rel: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            groundspeed: 0.0,
            battery_pct: None,
            battery_voltage: 0.0,
            armed: false,
            mode: None,
            gps_fix: 0,
            gps_satellites: 0,
            connected: false,
            last_heartbeat_ms: None,
            updated_at_ms: 0,
        }
    }
}

/// Lock-protected telemetry snapshot.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    state: Mutex<TelemetryState>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TelemetryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one protocol message as an atomic partial update.
    pub fn apply(&self, message: &LinkMessage) {
        let mut state = self.lock();
        match *message {
            LinkMessage::Heartbeat { armed, mode } => {
                state.armed = armed;
                state.mode = Some(mode);
                state.connected = true;
                state.last_heartbeat_ms = Some(now_ms());
            }
            LinkMessage::GlobalPosition { lat, lon, alt_msl, alt_rel, vx, vy, vz, heading } => {
                state.lat = lat;
                state.lon = lon;
                state.alt_msl = alt_msl;
                state.alt_rel = alt_rel;
                state.vx = vx;
                state.vy = vy;
                state.vz = vz;
                state.yaw = heading;
            }
            LinkMessage::GpsStatus { fix_type, satellites } => {
                state.gps_fix = fix_type;
                state.gps_satellites = satellites;
            }
            LinkMessage::SystemStatus { battery_pct, battery_voltage } => {
                state.battery_pct = battery_pct;
                state.battery_voltage = battery_voltage;
            }
            LinkMessage::Attitude { roll, pitch, yaw } => {
                state.roll = roll;
                state.pitch = pitch;
                state.yaw = yaw;
            }
            LinkMessage::VfrHud { groundspeed } => {
                state.groundspeed = groundspeed;
            }
            LinkMessage::CommandAck { .. } => {
                // Acks are consumed by the command handshake, not stored.
                return;
            }
        }
        state.updated_at_ms = now_ms();
    }

    pub fn set_connected(&self, connected: bool) {
        let mut state = self.lock();
        state.connected = connected;
        state.updated_at_ms = now_ms();
    }

    /// A complete copy of the current snapshot.
    pub fn snapshot(&self) -> TelemetryState {
        self.lock().clone()
    }

    /// Current (lat, lon, alt_rel).
    pub fn location(&self) -> (f64, f64, f64) {
        let state = self.lock();
        (state.lat, state.lon, state.alt_rel)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
