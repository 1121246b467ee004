//! Shared fixtures for scenario tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use skysentry_audit::AuditLog;
use skysentry_core::IdGenerator;
use skysentry_domain::{Mission, MissionParameters, Waypoint};
use skysentry_flight::{FlightController, SimHandle, SimulatedVehicle, TelemetryState};
use skysentry_identity::{CryptoEngine, DroneIdentity};
use skysentry_mission::{
    AlertPayload, PatrolConfig, PatrolMission, StatusPayload, Transport,
};
use skysentry_store::DataStore;
use skysentry_vision::{Detection, ObjectDetector, ScriptedDetector, SyntheticFrameSource};

/// Home position for simulated flights.
pub const HOME: (f64, f64) = (25.033964, 121.564468);

/// Provisioned identity + store + audit log rooted in a temp directory.
pub struct TestRig {
    pub ids: Arc<IdGenerator>,
    pub engine: Arc<CryptoEngine>,
    pub store: Arc<DataStore>,
    pub audit: Arc<AuditLog>,
    pub drone_id: String,
    pub base: PathBuf,
}

impl Drop for TestRig {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.base).ok();
    }
}

pub fn provisioned_rig() -> TestRig {
    let base = std::env::temp_dir().join(format!("skysentry_it_{}", uuid::Uuid::new_v4()));
    let ids = Arc::new(IdGenerator::new());

    let mut identity = DroneIdentity::load(base.join("identity")).unwrap();
    let provisioned = identity.provision("test-org", &ids).unwrap();
    let engine = Arc::new(CryptoEngine::new(Arc::new(identity)));

    let store = Arc::new(DataStore::open(base.join("missions.db")).unwrap());
    let audit = Arc::new(AuditLog::new(
        store.clone(),
        engine.clone(),
        ids.clone(),
        provisioned.drone_id.clone(),
    ));

    TestRig {
        ids,
        engine,
        store,
        audit,
        drone_id: provisioned.drone_id,
        base,
    }
}

/// Patrol tuning fast enough for tests but on the same code paths.
pub fn fast_patrol_config(base: &Path) -> PatrolConfig {
    PatrolConfig {
        waypoint_hover: Duration::from_millis(100),
        detection_loiter: Duration::from_millis(200),
        rtl_battery_pct: 25,
        min_battery_pct: 30,
        waypoint_tolerance_m: 2.0,
        loop_pace: Duration::from_millis(10),
        altitude_timeout: Duration::from_secs(5),
        alert_cooldown: Duration::from_secs(10),
        detections_dir: base.join("detections"),
    }
}

/// Waypoints a fast sim vehicle crosses in well under a second each.
pub fn short_route() -> Vec<Waypoint> {
    vec![
        Waypoint { lat: HOME.0 + 0.0003, lon: HOME.1, alt: None },
        Waypoint { lat: HOME.0 + 0.0003, lon: HOME.1 + 0.0003, alt: None },
    ]
}

/// One waypoint roughly 2 km out; transit dominates the mission so
/// mid-flight events (battery drops, pause requests) land in transit.
pub fn long_route() -> Vec<Waypoint> {
    vec![Waypoint { lat: HOME.0 + 0.02, lon: HOME.1, alt: None }]
}

pub fn person(confidence: f64) -> Detection {
    Detection {
        class_name: "person".to_string(),
        class_id: 0,
        confidence,
        x1: 100,
        y1: 100,
        x2: 180,
        y2: 260,
    }
}

pub fn vehicle(confidence: f64) -> Detection {
    Detection {
        class_name: "vehicle".to_string(),
        class_id: 2,
        confidence,
        x1: 300,
        y1: 200,
        x2: 420,
        y2: 280,
    }
}

/// Transport double that records everything it publishes.
#[derive(Default)]
pub struct RecordingTransport {
    pub alerts: Mutex<Vec<AlertPayload>>,
    pub statuses: Mutex<Vec<StatusPayload>>,
}

impl Transport for RecordingTransport {
    fn is_connected(&self) -> bool {
        true
    }

    fn publish_alert(&self, alert: &AlertPayload) -> bool {
        self.alerts.lock().unwrap().push(alert.clone());
        true
    }

    fn publish_status(&self, status: &StatusPayload) -> bool {
        self.statuses.lock().unwrap().push(status.clone());
        true
    }

    fn publish_telemetry(&self, _telemetry: &TelemetryState) -> bool {
        true
    }
}

pub struct PatrolFixture {
    pub patrol: PatrolMission,
    pub sim: SimHandle,
    pub transport: Arc<RecordingTransport>,
    pub mission_id: String,
}

/// Build a connected patrol over the simulated vehicle.
///
/// `speed_ms` is both the mission cruise speed and what the sim flies.
pub fn patrol_fixture(
    rig: &TestRig,
    waypoints: Vec<Waypoint>,
    detector: ScriptedDetector,
    speed_ms: f64,
    loop_route: bool,
    battery_pct: u8,
) -> PatrolFixture {
    let sim = SimulatedVehicle::new(HOME.0, HOME.1).with_battery(battery_pct);
    let sim_handle = sim.handle();

    let mut fc = FlightController::new(
        Box::new(sim),
        Duration::from_secs(2),
        Duration::from_secs(1),
    );
    fc.connect().unwrap();
    fc.drain_telemetry();

    let mission = Mission::new(
        rig.ids.generate(),
        rig.drone_id.clone(),
        waypoints,
        MissionParameters {
            altitude_m: 3.0,
            speed_ms,
            loop_route,
            detection_classes: vec!["person".to_string(), "vehicle".to_string()],
        },
    );
    rig.store.save_mission(&mission).unwrap();
    let mission_id = mission.id.clone();

    let transport = Arc::new(RecordingTransport::default());
    let patrol = PatrolMission::new(
        mission,
        fc,
        Box::new(SyntheticFrameSource::new(640, 480)),
        Box::new(detector) as Box<dyn ObjectDetector>,
        rig.store.clone(),
        rig.engine.clone(),
        rig.audit.clone(),
        Some(transport.clone() as Arc<dyn Transport>),
        rig.ids.clone(),
        fast_patrol_config(&rig.base),
    )
    .unwrap();

    PatrolFixture { patrol, sim: sim_handle, transport, mission_id }
}

/// Ordered audit action tags for a rig.
pub fn audit_actions(rig: &TestRig) -> Vec<String> {
    rig.store
        .audit_entries_asc()
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect()
}
