//! Autonomous patrol missions.
//!
//! Flies the mission's waypoints while running the detection pipeline,
//! with a battery interlock that overrides everything else in progress.
//! One control thread drives the loop; the [`PatrolHandle`] atomics are
//! the only cross-thread control surface, and every wait in the loop
//! observes them at sub-second latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use skysentry_audit::AuditLog;
use skysentry_core::IdGenerator;
use skysentry_domain::{AuditDetails, Mission, MissionStatus};
use skysentry_flight::{FlightController, FlightMode};
use skysentry_identity::CryptoEngine;
use skysentry_store::DataStore;
use skysentry_vision::{FrameSource, ObjectDetector};

use crate::alerts::AlertPipeline;
use crate::error::MissionError;
use crate::transport::{StatusPayload, Transport};

/// Patrol loop tuning.
#[derive(Debug, Clone)]
pub struct PatrolConfig {
    /// Dwell at each waypoint.
    pub waypoint_hover: Duration,
    /// Extra dwell after a detection produced a finding.
    pub detection_loiter: Duration,
    /// Battery percentage that forces return-to-launch.
    pub rtl_battery_pct: u8,
    /// Minimum battery percentage to pass preflight.
    pub min_battery_pct: u8,
    pub waypoint_tolerance_m: f64,
    /// Pacing delay of the control loop.
    pub loop_pace: Duration,
    /// How long start() waits for takeoff altitude.
    pub altitude_timeout: Duration,
    pub alert_cooldown: Duration,
    pub detections_dir: std::path::PathBuf,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            waypoint_hover: Duration::from_secs(5),
            detection_loiter: Duration::from_secs(10),
            rtl_battery_pct: 25,
            min_battery_pct: 30,
            waypoint_tolerance_m: 2.0,
            loop_pace: Duration::from_millis(100),
            altitude_timeout: Duration::from_secs(30),
            alert_cooldown: Duration::from_secs(30),
            detections_dir: std::path::PathBuf::from("/var/skysentry/detections"),
        }
    }
}

/// Cross-thread control handle for a running patrol.
#[derive(Clone)]
pub struct PatrolHandle {
    running: Arc<AtomicBool>,
    pause_requested: Arc<AtomicBool>,
    abort_requested: Arc<AtomicBool>,
}

impl PatrolHandle {
    /// Request an abort. The loop observes this within one pacing cycle.
    pub fn stop(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Request a pause (station-keeping; telemetry polling continues).
    pub fn pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.pause_requested.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Executes an autonomous patrol with detection.
///
/// Lifecycle: `preflight()` to inspect readiness, `start()` to arm,
/// take off and run the loop to termination. The mission row is
/// persisted on every status change, and this controller is its only
/// writer.
pub struct PatrolMission {
    mission: Mission,
    flight: FlightController,
    capture: Box<dyn FrameSource>,
    detector: Box<dyn ObjectDetector>,
    store: Arc<DataStore>,
    audit: Arc<AuditLog>,
    transport: Option<Arc<dyn Transport>>,
    alerts: AlertPipeline,
    config: PatrolConfig,

    running: Arc<AtomicBool>,
    pause_requested: Arc<AtomicBool>,
    abort_requested: Arc<AtomicBool>,
    battery_stop: bool,
    paused: bool,
    current_wp_index: usize,
    findings_total: usize,
}

impl PatrolMission {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mission: Mission,
        flight: FlightController,
        capture: Box<dyn FrameSource>,
        detector: Box<dyn ObjectDetector>,
        store: Arc<DataStore>,
        engine: Arc<CryptoEngine>,
        audit: Arc<AuditLog>,
        transport: Option<Arc<dyn Transport>>,
        ids: Arc<IdGenerator>,
        config: PatrolConfig,
    ) -> Result<Self, MissionError> {
        let alerts = AlertPipeline::new(
            store.clone(),
            engine,
            audit.clone(),
            transport.clone(),
            ids,
            mission.id.clone(),
            config.detections_dir.clone(),
            config.alert_cooldown,
        )?;
        Ok(Self {
            mission,
            flight,
            capture,
            detector,
            store,
            audit,
            transport,
            alerts,
            config,
            running: Arc::new(AtomicBool::new(false)),
            pause_requested: Arc::new(AtomicBool::new(false)),
            abort_requested: Arc::new(AtomicBool::new(false)),
            battery_stop: false,
            paused: false,
            current_wp_index: 0,
            findings_total: 0,
        })
    }

    pub fn handle(&self) -> PatrolHandle {
        PatrolHandle {
            running: self.running.clone(),
            pause_requested: self.pause_requested.clone(),
            abort_requested: self.abort_requested.clone(),
        }
    }

    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    pub fn current_waypoint_index(&self) -> usize {
        self.current_wp_index
    }

    pub fn findings_total(&self) -> usize {
        self.findings_total
    }

    /// Verify all systems are ready. Returns every failing condition, not
    /// just the first, so an operator sees everything that must be fixed.
    pub fn preflight(&mut self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.flight.is_connected() {
            issues.push("flight link not connected".to_string());
        }
        if !self.capture.is_open() {
            if let Err(e) = self.capture.open() {
                issues.push(format!("capture device unavailable: {e}"));
            }
        }
        if !self.detector.is_ready() {
            issues.push("detection backend not ready".to_string());
        }
        if self.mission.waypoints.is_empty() {
            issues.push("no waypoints defined".to_string());
        }

        let telemetry = self.flight.telemetry();
        if let Some(pct) = telemetry.battery_pct {
            if pct < self.config.min_battery_pct {
                issues.push(format!(
                    "battery low: {pct}% (minimum {}%)",
                    self.config.min_battery_pct
                ));
            }
        }
        if telemetry.gps_fix < 3 {
            issues.push(format!(
                "GPS fix insufficient: {} (need 3D)",
                telemetry.gps_fix
            ));
        }

        issues
    }

    /// Start the patrol: preflight, arm, take off, run the loop.
    ///
    /// Fails closed: no vehicle command is issued when preflight fails.
    /// A failed mode change, arm, or takeoff aborts the start without
    /// entering the loop.
    pub fn start(&mut self) -> Result<(), MissionError> {
        let issues = self.preflight();
        if !issues.is_empty() {
            for issue in &issues {
                error!(issue = %issue, "preflight");
            }
            return Err(MissionError::Preflight(issues));
        }

        let mut details = AuditDetails::new();
        details.insert("mission_id".to_string(), self.mission.id.clone().into());
        details.insert("waypoints".to_string(), self.mission.waypoints.len().into());
        self.audit.log("mission_start", details)?;

        self.transition(MissionStatus::Active)?;

        if let Err(e) = self.launch() {
            error!(error = %e, "launch failed, aborting mission");
            self.transition(MissionStatus::Aborted)?;
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            mission_id = %self.mission.id,
            waypoints = self.mission.waypoints.len(),
            "patrol started"
        );

        self.run_loop()
    }

    /// Mode, arm, takeoff, altitude wait, cruise speed, capture.
    fn launch(&mut self) -> Result<(), MissionError> {
        let altitude = self.mission.parameters.altitude_m;
        let speed = self.mission.parameters.speed_ms;

        info!("setting GUIDED mode");
        self.flight.set_mode(FlightMode::Guided)?;

        info!("arming");
        self.flight.arm()?;

        info!(altitude_m = altitude, "taking off");
        self.flight.takeoff(altitude)?;

        self.wait_for_altitude(altitude * 0.9, self.config.altitude_timeout);

        if let Err(e) = self.flight.set_speed(speed) {
            warn!(error = %e, "failed to set cruise speed");
        }
        self.capture.start()?;
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), MissionError> {
        let waypoints = self.mission.waypoints.clone();
        let loop_route = self.mission.parameters.loop_route;
        let default_alt = self.mission.parameters.altitude_m;

        'patrol: while self.is_running() {
            for (index, waypoint) in waypoints.iter().enumerate() {
                if !self.is_running() {
                    break 'patrol;
                }
                self.current_wp_index = index;
                let wp_alt = waypoint.alt.unwrap_or(default_alt);

                info!(
                    waypoint = index,
                    lat = waypoint.lat,
                    lon = waypoint.lon,
                    "navigating to waypoint"
                );
                let mut details = AuditDetails::new();
                details.insert("waypoint_index".to_string(), index.into());
                details.insert(
                    "target".to_string(),
                    serde_json::json!([waypoint.lat, waypoint.lon, wp_alt]),
                );
                self.audit.log("waypoint_navigate", details)?;

                if let Err(e) = self.flight.goto(waypoint.lat, waypoint.lon, wp_alt) {
                    warn!(error = %e, waypoint = index, "goto failed");
                }

                // Transit: detect and watch the battery until arrival.
                while self.is_running()
                    && !self.flight.reached_waypoint(
                        waypoint.lat,
                        waypoint.lon,
                        self.config.waypoint_tolerance_m,
                    )
                {
                    self.cycle();
                    std::thread::sleep(self.config.loop_pace);
                }

                if !self.is_running() {
                    break 'patrol;
                }

                // Hover, extending the dwell when a detection fires.
                debug!(waypoint = index, "reached waypoint, hovering");
                let hover_end = Instant::now() + self.config.waypoint_hover;
                while self.is_running() && Instant::now() < hover_end {
                    if self.cycle() {
                        info!(waypoint = index, "detection during hover, loitering");
                        let loiter_end = Instant::now() + self.config.detection_loiter;
                        while self.is_running() && Instant::now() < loiter_end {
                            self.cycle();
                            std::thread::sleep(self.config.loop_pace);
                        }
                    }
                    std::thread::sleep(self.config.loop_pace);
                }
            }

            if !self.is_running() {
                break;
            }
            if !loop_route {
                info!("patrol complete (single pass)");
                break;
            }
            info!("patrol loop complete, restarting");
            let mut details = AuditDetails::new();
            details.insert("findings_total".to_string(), self.findings_total.into());
            self.audit.log("patrol_loop_complete", details)?;
        }

        self.finalize()
    }

    /// One control cycle: drain telemetry, run detection, check the
    /// battery interlock, service pause requests. Returns true when the
    /// detection pass produced at least one finding.
    fn cycle(&mut self) -> bool {
        self.flight.drain_telemetry();
        let found = self.process_frame();
        self.check_battery();
        self.service_pause();
        found
    }

    fn process_frame(&mut self) -> bool {
        let Some((frame, _)) = self.capture.latest() else {
            return false;
        };
        let detections = self.detector.detect(&frame);
        if detections.is_empty() {
            return false;
        }
        let (lat, lon, alt) = self.flight.location();
        match self.alerts.process_detections(&detections, &frame, lat, lon, alt) {
            Ok(findings) => {
                self.findings_total += findings.len();
                !findings.is_empty()
            }
            Err(e) => {
                error!(error = %e, "alert pipeline failure");
                false
            }
        }
    }

    /// Battery interlock: a known reading below the threshold stops the
    /// loop and forces return-to-launch, overriding everything else. The
    /// audit entry lands before the RTL command and before any further
    /// navigation.
    fn check_battery(&mut self) {
        if !self.is_running() || self.battery_stop {
            return;
        }
        let Some(pct) = self.flight.telemetry().battery_pct else {
            return;
        };
        if pct >= self.config.rtl_battery_pct {
            return;
        }

        warn!(
            battery_pct = pct,
            threshold = self.config.rtl_battery_pct,
            "battery critical, initiating return to launch"
        );
        let mut details = AuditDetails::new();
        details.insert("battery_pct".to_string(), pct.into());
        details.insert("threshold".to_string(), self.config.rtl_battery_pct.into());
        if let Err(e) = self.audit.log("battery_rtl", details) {
            error!(error = %e, "failed to audit battery interlock");
        }

        self.battery_stop = true;
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.flight.rtl() {
            error!(error = %e, "RTL command failed");
        }
    }

    /// Pause blocks progression, not the vehicle: the loop keeps
    /// draining telemetry while station-keeping until resumed or aborted.
    fn service_pause(&mut self) {
        if !self.pause_requested.load(Ordering::SeqCst) || self.paused {
            return;
        }
        self.paused = true;

        if let Err(e) = self.flight.set_mode(FlightMode::Loiter) {
            warn!(error = %e, "failed to enter LOITER for pause");
        }
        if let Err(e) = self.transition(MissionStatus::Paused) {
            error!(error = %e, "failed to persist paused status");
        }
        if let Err(e) = self.audit.log("mission_paused", AuditDetails::new()) {
            error!(error = %e, "failed to audit pause");
        }

        while self.pause_requested.load(Ordering::SeqCst) && self.is_running() {
            self.flight.drain_telemetry();
            self.check_battery();
            std::thread::sleep(Duration::from_millis(500));
        }
        self.paused = false;

        if self.is_running() {
            if let Err(e) = self.flight.set_mode(FlightMode::Guided) {
                warn!(error = %e, "failed to restore GUIDED after pause");
            }
            if let Err(e) = self.transition(MissionStatus::Active) {
                error!(error = %e, "failed to persist resumed status");
            }
            if let Err(e) = self.audit.log("mission_resumed", AuditDetails::new()) {
                error!(error = %e, "failed to audit resume");
            }
        }
    }

    fn wait_for_altitude(&mut self, target_alt: f64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            self.flight.drain_telemetry();
            if self.flight.telemetry().alt_rel >= target_alt {
                return true;
            }
            std::thread::sleep(Duration::from_millis(200));
        }
        warn!(
            wanted = target_alt,
            at = self.flight.telemetry().alt_rel,
            "altitude wait timed out"
        );
        false
    }

    fn finalize(&mut self) -> Result<(), MissionError> {
        if self.battery_stop {
            self.finalize_battery()
        } else if self.abort_requested.load(Ordering::SeqCst) {
            self.finalize_abort()
        } else {
            self.complete()
        }
    }

    fn complete(&mut self) -> Result<(), MissionError> {
        info!(findings_total = self.findings_total, "mission complete");
        self.running.store(false, Ordering::SeqCst);

        let mut details = AuditDetails::new();
        details.insert("mission_id".to_string(), self.mission.id.clone().into());
        details.insert("findings_total".to_string(), self.findings_total.into());
        self.audit.log("mission_complete", details)?;

        self.transition(MissionStatus::Completed)?;
        if let Err(e) = self.flight.land() {
            warn!(error = %e, "land command failed");
        }
        self.capture.stop();

        if let Some(transport) = &self.transport {
            if transport.is_connected() {
                transport.publish_status(&StatusPayload {
                    mission_id: self.mission.id.clone(),
                    status: "completed".to_string(),
                    findings_total: self.findings_total,
                });
            }
        }
        Ok(())
    }

    fn finalize_abort(&mut self) -> Result<(), MissionError> {
        warn!(mission_id = %self.mission.id, "mission aborted");

        let mut details = AuditDetails::new();
        details.insert("findings_total".to_string(), self.findings_total.into());
        details.insert("last_waypoint".to_string(), self.current_wp_index.into());
        self.audit.log("mission_abort", details)?;

        self.transition(MissionStatus::Aborted)?;
        if let Err(e) = self.flight.rtl() {
            error!(error = %e, "RTL command failed during abort");
        }
        self.capture.stop();
        Ok(())
    }

    /// Battery finalization: the interlock already audited the reading
    /// and issued RTL; record the abort and stop capture.
    fn finalize_battery(&mut self) -> Result<(), MissionError> {
        let mut details = AuditDetails::new();
        details.insert("findings_total".to_string(), self.findings_total.into());
        details.insert("last_waypoint".to_string(), self.current_wp_index.into());
        details.insert("reason".to_string(), "battery_critical".into());
        self.audit.log("mission_abort", details)?;

        self.transition(MissionStatus::Aborted)?;
        self.capture.stop();
        Ok(())
    }

    fn transition(&mut self, status: MissionStatus) -> Result<(), MissionError> {
        if !self.mission.status.can_transition(status) {
            warn!(
                from = self.mission.status.as_str(),
                to = status.as_str(),
                "unexpected mission status transition"
            );
        }
        self.mission.status = status;
        self.store.save_mission(&self.mission)?;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
