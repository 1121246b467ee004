//! In-process simulated vehicle.
//!
//! A [`VehicleLink`] that stands in for a real autopilot: it emits
//! heartbeat/position/GPS/battery streams, acknowledges commands, honors
//! mode changes, and flies toward position targets at the commanded
//! speed. Used by the node binary's `sim` link and by scenario tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::FlightError;
use crate::link::{AckResult, CommandId, LinkMessage, VehicleCommand, VehicleLink};
use crate::modes::FlightMode;

const EMIT_INTERVAL: Duration = Duration::from_millis(20);
const CLIMB_RATE_MS: f64 = 10.0;
const DESCENT_RATE_MS: f64 = 10.0;
const METERS_PER_DEG_LAT: f64 = 111_320.0;

#[derive(Debug)]
struct SimState {
    open: bool,
    lat: f64,
    lon: f64,
    home_lat: f64,
    home_lon: f64,
    alt_rel: f64,
    speed_ms: f64,
    battery_pct: u8,
    battery_voltage: f64,
    armed: bool,
    mode: FlightMode,
    target: Option<(f64, f64)>,
    climb_target: Option<f64>,
    command_log: Vec<CommandId>,
    outbox: VecDeque<LinkMessage>,
    last_tick: Instant,
    last_emit: Instant,
}

impl SimState {
    fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f64().min(1.0);
        self.last_tick = now;

        if let Some(target_alt) = self.climb_target {
            if self.alt_rel < target_alt {
                self.alt_rel = (self.alt_rel + CLIMB_RATE_MS * dt).min(target_alt);
            } else {
                self.climb_target = None;
            }
        }

        match self.mode {
            FlightMode::Guided => {
                if self.armed {
                    if let Some((lat, lon)) = self.target {
                        self.step_toward(lat, lon, dt);
                    }
                }
            }
            FlightMode::Rtl => {
                let (home_lat, home_lon) = (self.home_lat, self.home_lon);
                if !self.step_toward(home_lat, home_lon, dt) {
                    self.descend(dt);
                }
            }
            FlightMode::Land => {
                self.descend(dt);
            }
            _ => {}
        }
    }

    /// Move toward the target. Returns true while still in transit.
    fn step_toward(&mut self, lat: f64, lon: f64, dt: f64) -> bool {
        let meters_per_deg_lon = METERS_PER_DEG_LAT * self.lat.to_radians().cos();
        let dy = (lat - self.lat) * METERS_PER_DEG_LAT;
        let dx = (lon - self.lon) * meters_per_deg_lon;
        let distance = (dx * dx + dy * dy).sqrt();
        let step = self.speed_ms * dt;
        if distance <= step || distance < 0.05 {
            self.lat = lat;
            self.lon = lon;
            return false;
        }
        self.lat += dy / distance * step / METERS_PER_DEG_LAT;
        self.lon += dx / distance * step / meters_per_deg_lon;
        true
    }

    fn descend(&mut self, dt: f64) {
        self.climb_target = None;
        self.alt_rel = (self.alt_rel - DESCENT_RATE_MS * dt).max(0.0);
        if self.alt_rel == 0.0 {
            self.armed = false;
        }
    }

    fn emit(&mut self) {
        self.outbox.push_back(LinkMessage::Heartbeat { armed: self.armed, mode: self.mode });
        self.outbox.push_back(LinkMessage::GlobalPosition {
            lat: self.lat,
            lon: self.lon,
            alt_msl: self.alt_rel + 50.0,
            alt_rel: self.alt_rel,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            heading: 0.0,
        });
        self.outbox.push_back(LinkMessage::GpsStatus { fix_type: 3, satellites: 12 });
        self.outbox.push_back(LinkMessage::SystemStatus {
            battery_pct: Some(self.battery_pct),
            battery_voltage: self.battery_voltage,
        });
        self.outbox.push_back(LinkMessage::VfrHud { groundspeed: self.speed_ms });
    }
}

/// Simulated autopilot link.
pub struct SimulatedVehicle {
    state: Arc<Mutex<SimState>>,
}

/// Test/operator handle into the simulated vehicle state.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Arc<Mutex<SimState>>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedVehicle {
    pub fn new(lat: f64, lon: f64) -> Self {
        let now = Instant::now();
        Self {
            state: Arc::new(Mutex::new(SimState {
                open: false,
                lat,
                lon,
                home_lat: lat,
                home_lon: lon,
                alt_rel: 0.0,
                speed_ms: 5.0,
                battery_pct: 100,
                battery_voltage: 16.2,
                armed: false,
                mode: FlightMode::Stabilize,
                target: None,
                climb_target: None,
                command_log: Vec::new(),
                outbox: VecDeque::new(),
                last_tick: now,
                last_emit: now.checked_sub(EMIT_INTERVAL).unwrap_or(now),
            })),
        }
    }

    pub fn with_battery(self, pct: u8) -> Self {
        lock(&self.state).battery_pct = pct;
        self
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle { state: self.state.clone() }
    }
}

impl SimHandle {
    pub fn set_battery_pct(&self, pct: u8) {
        lock(&self.state).battery_pct = pct;
    }

    pub fn mode(&self) -> FlightMode {
        lock(&self.state).mode
    }

    pub fn armed(&self) -> bool {
        lock(&self.state).armed
    }

    pub fn position(&self) -> (f64, f64, f64) {
        let state = lock(&self.state);
        (state.lat, state.lon, state.alt_rel)
    }

    /// Every command id received so far, in order.
    pub fn commands(&self) -> Vec<CommandId> {
        lock(&self.state).command_log.clone()
    }
}

impl VehicleLink for SimulatedVehicle {
    fn open(&mut self) -> Result<(), FlightError> {
        lock(&self.state).open = true;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        state.open = false;
        state.outbox.clear();
    }

    fn send(&mut self, command: &VehicleCommand) -> Result<(), FlightError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(FlightError::Link("link not open".to_string()));
        }
        let id = command.id();
        state.command_log.push(id);
        match *command {
            VehicleCommand::SetMode(mode) => state.mode = mode,
            VehicleCommand::Arm => state.armed = true,
            VehicleCommand::Disarm => state.armed = false,
            VehicleCommand::Takeoff { altitude_m } => {
                if state.armed {
                    state.climb_target = Some(altitude_m);
                }
            }
            VehicleCommand::Goto { lat, lon, alt_m } => {
                state.target = Some((lat, lon));
                state.climb_target = Some(alt_m);
            }
            VehicleCommand::SetSpeed { speed_ms } => state.speed_ms = speed_ms,
        }
        state
            .outbox
            .push_back(LinkMessage::CommandAck { command: id, result: AckResult::Accepted });
        Ok(())
    }

    fn recv(&mut self) -> Option<LinkMessage> {
        let mut state = lock(&self.state);
        if !state.open {
            return None;
        }
        if state.outbox.is_empty() && state.last_emit.elapsed() >= EMIT_INTERVAL {
            state.last_emit = Instant::now();
            state.tick();
            state.emit();
        }
        state.outbox.pop_front()
    }
}
