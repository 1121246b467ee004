//! End-to-end patrol scenarios over the simulated vehicle.

use std::time::Duration;

use skysentry_audit::ChainVerdict;
use skysentry_domain::MissionStatus;
use skysentry_flight::{CommandId, FlightMode};
use skysentry_mission::MissionError;
use skysentry_vision::ScriptedDetector;

use crate::test_utils::*;

#[test]
fn full_patrol_completes_and_chain_verifies() {
    let rig = provisioned_rig();
    let mut fixture = patrol_fixture(
        &rig,
        short_route(),
        ScriptedDetector::idle(),
        150.0,
        false,
        100,
    );

    fixture.patrol.start().unwrap();

    let mission = rig.store.get_mission(&fixture.mission_id).unwrap().unwrap();
    assert_eq!(mission.status, MissionStatus::Completed);

    let actions = audit_actions(&rig);
    assert_eq!(actions[0], "mission_start");
    assert_eq!(
        actions.iter().filter(|a| *a == "waypoint_navigate").count(),
        2,
        "one navigate entry per waypoint"
    );
    assert_eq!(actions.last().map(String::as_str), Some("mission_complete"));

    let verdict = rig.audit.verify_chain().unwrap();
    assert!(matches!(verdict, ChainVerdict::Intact { entries } if entries == actions.len()));

    // Completion was published.
    let statuses = fixture.transport.statuses.lock().unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].status, "completed");
    assert_eq!(statuses[0].mission_id, fixture.mission_id);
}

#[test]
fn preflight_failures_all_reported_and_no_commands_issued() {
    let rig = provisioned_rig();
    // Low battery AND an empty route: both must be reported.
    let mut fixture = patrol_fixture(
        &rig,
        Vec::new(),
        ScriptedDetector::idle(),
        50.0,
        false,
        10,
    );

    let err = fixture.patrol.start().unwrap_err();
    let MissionError::Preflight(issues) = err else {
        panic!("expected preflight failure");
    };
    assert_eq!(issues.len(), 2, "issues: {issues:?}");
    assert!(issues.iter().any(|i| i.contains("battery low")));
    assert!(issues.iter().any(|i| i.contains("no waypoints")));

    // Fail closed: no mode change, arm, or takeoff reached the vehicle.
    assert!(fixture.sim.commands().is_empty());

    // Mission row never left Draft.
    let mission = rig.store.get_mission(&fixture.mission_id).unwrap().unwrap();
    assert_eq!(mission.status, MissionStatus::Draft);
}

#[test]
fn detections_create_signed_findings_and_alerts() {
    let rig = provisioned_rig();
    // Same-class repeat inside the cooldown window plus a second class:
    // exactly two findings should come out.
    let script = vec![vec![person(0.92), person(0.88), vehicle(0.81)]];
    let mut fixture = patrol_fixture(
        &rig,
        short_route(),
        ScriptedDetector::with_script(script),
        150.0,
        false,
        100,
    );

    fixture.patrol.start().unwrap();
    assert_eq!(fixture.patrol.findings_total(), 2);

    let findings = rig.store.findings_for_mission(&fixture.mission_id).unwrap();
    assert_eq!(findings.len(), 2);
    for finding in &findings {
        assert!(
            rig.engine.verify_signature(&finding.signable_payload(), &finding.signature),
            "stored finding must verify"
        );
        assert!(std::path::Path::new(&finding.image_path).exists());
    }

    let alerts = fixture.transport.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().any(|a| a.detection_class == "person"));
    assert!(alerts.iter().any(|a| a.detection_class == "vehicle"));

    let actions = audit_actions(&rig);
    assert_eq!(actions.iter().filter(|a| *a == "detection").count(), 2);
    assert!(rig.audit.verify_chain().unwrap().is_intact());
}

#[test]
fn battery_drop_forces_rtl_before_any_further_navigation() {
    let rig = provisioned_rig();
    let mut fixture = patrol_fixture(
        &rig,
        long_route(),
        ScriptedDetector::idle(),
        30.0,
        true,
        100,
    );

    let sim = fixture.sim.clone();
    let dropper = std::thread::spawn(move || {
        // Let launch finish and the transit begin, then drain the pack.
        std::thread::sleep(Duration::from_millis(1500));
        sim.set_battery_pct(10);
    });

    fixture.patrol.start().unwrap();
    dropper.join().unwrap();

    let mission = rig.store.get_mission(&fixture.mission_id).unwrap().unwrap();
    assert_eq!(mission.status, MissionStatus::Aborted);
    assert_eq!(fixture.sim.mode(), FlightMode::Rtl);

    let actions = audit_actions(&rig);
    let rtl_index = actions.iter().position(|a| a == "battery_rtl").expect("battery_rtl audited");
    assert!(
        actions[rtl_index + 1..].iter().all(|a| a != "waypoint_navigate"),
        "no navigation after the interlock: {actions:?}"
    );

    let entries = rig.store.audit_entries_asc().unwrap();
    let rtl_entry = &entries[rtl_index];
    assert_eq!(rtl_entry.details["battery_pct"], serde_json::json!(10));
    assert_eq!(rtl_entry.details["threshold"], serde_json::json!(25));

    assert!(rig.audit.verify_chain().unwrap().is_intact());
}

#[test]
fn pause_resume_and_abort_are_audited() {
    let rig = provisioned_rig();
    let mut fixture = patrol_fixture(
        &rig,
        long_route(),
        ScriptedDetector::idle(),
        20.0,
        true,
        100,
    );

    let handle = fixture.patrol.handle();
    let driver = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(1500));
        handle.pause();
        std::thread::sleep(Duration::from_millis(900));
        handle.resume();
        std::thread::sleep(Duration::from_millis(900));
        handle.stop();
    });

    fixture.patrol.start().unwrap();
    driver.join().unwrap();

    let mission = rig.store.get_mission(&fixture.mission_id).unwrap().unwrap();
    assert_eq!(mission.status, MissionStatus::Aborted);

    let actions = audit_actions(&rig);
    let paused = actions.iter().position(|a| a == "mission_paused").expect("pause audited");
    let resumed = actions.iter().position(|a| a == "mission_resumed").expect("resume audited");
    let aborted = actions.iter().position(|a| a == "mission_abort").expect("abort audited");
    assert!(paused < resumed && resumed < aborted);

    // Abort commanded return-to-launch.
    assert_eq!(fixture.sim.mode(), FlightMode::Rtl);
    assert!(rig.audit.verify_chain().unwrap().is_intact());
}

#[test]
fn launch_sequence_reaches_vehicle_in_order() {
    let rig = provisioned_rig();
    let mut fixture = patrol_fixture(
        &rig,
        short_route(),
        ScriptedDetector::idle(),
        150.0,
        false,
        100,
    );

    fixture.patrol.start().unwrap();

    let commands = fixture.sim.commands();
    // GUIDED, arm, takeoff lead the sequence; the final LAND mode change
    // arrives last.
    assert_eq!(
        &commands[..3],
        &[CommandId::SetMode, CommandId::ArmDisarm, CommandId::Takeoff]
    );
    assert_eq!(commands.last(), Some(&CommandId::SetMode));
    assert_eq!(fixture.sim.mode(), FlightMode::Land);
}
