//! Skysentry node CLI.
//!
//! Presentation layer over the core operations: provision an identity,
//! inspect status, run preflight, fly a patrol, list missions, and show
//! or verify the audit log. Exits zero on success, non-zero when a
//! precondition fails or the audit chain is broken.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use skysentry_audit::{AuditLog, ChainVerdict};
use skysentry_core::{logging, Config, IdGenerator};
use skysentry_domain::{Mission, MissionParameters, Waypoint};
use skysentry_flight::{FlightController, SimulatedVehicle, VehicleLink};
use skysentry_identity::{CryptoEngine, DroneIdentity};
use skysentry_mission::{PatrolConfig, PatrolMission};
use skysentry_store::DataStore;
use skysentry_vision::{ScriptedDetector, SyntheticFrameSource};

const USAGE: &str = "\
skysentry-node: autonomous patrol node

USAGE:
    skysentry-node [--config <path>] <command> [options]

COMMANDS:
    provision [--org-id <id>] [--identity-dir <dir>]
        Provision a new drone identity (run once per device).
    status
        Connect to the vehicle and print a telemetry snapshot.
    preflight --waypoints <file>
        Run preflight checks and report every failing condition.
    patrol --waypoints <file> [--altitude <m>] [--speed <m/s>] [--no-loop]
        Start a surveillance patrol mission.
    missions
        List all missions.
    audit [--limit <n>]
        Show recent audit log entries.
    verify-audit
        Verify the audit log hash chain integrity.
";

fn main() {
    logging::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn run(args: &[String]) -> anyhow::Result<i32> {
    let config = match arg_value(args, "--config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let Some(command) = find_command(args) else {
        eprint!("{USAGE}");
        return Ok(1);
    };

    match command.as_str() {
        "provision" => cmd_provision(args, &config),
        "status" => cmd_status(&config),
        "preflight" => cmd_patrol(args, &config, true),
        "patrol" => cmd_patrol(args, &config, false),
        "missions" => cmd_missions(&config),
        "audit" => cmd_audit(args, &config),
        "verify-audit" => cmd_verify_audit(&config),
        other => {
            eprintln!("unknown command: {other}");
            eprint!("{USAGE}");
            Ok(1)
        }
    }
}

fn cmd_provision(args: &[String], config: &Config) -> anyhow::Result<i32> {
    let dir = arg_value(args, "--identity-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.identity.dir.clone());
    let org_id = arg_value(args, "--org-id").unwrap_or_else(|| config.identity.org_id.clone());

    let mut identity = DroneIdentity::load(&dir)?;
    if identity.is_provisioned() {
        println!(
            "Drone already provisioned: {}",
            identity.drone_id().unwrap_or("?")
        );
        println!("To re-provision, delete the identity directory first.");
        return Ok(1);
    }

    println!("Provisioning new drone identity...");
    let ids = IdGenerator::new();
    let result = identity.provision(&org_id, &ids)?;

    println!();
    println!("=== DRONE PROVISIONED ===");
    println!("  Drone ID:    {}", result.drone_id);
    println!("  Org ID:      {}", result.org_id);
    println!("  HW Finger:   {}...", &result.hardware_fingerprint[..16]);
    println!("  Operator ID: {}", result.operator_id);
    println!("  Secret:      {}", result.operator_secret);
    println!();
    println!("SAVE THE OPERATOR SECRET - it will not be shown again.");
    println!("Public key stored at: {}", dir.join("verifying_key.pub").display());
    Ok(0)
}

fn build_link(config: &Config) -> anyhow::Result<Box<dyn VehicleLink>> {
    match config.flight.link.as_str() {
        "sim" => Ok(Box::new(SimulatedVehicle::new(25.033964, 121.564468))),
        other => anyhow::bail!(
            "no link driver for '{other}'; configure [flight] link = \"sim\" or supply a driver"
        ),
    }
}

fn build_controller(config: &Config) -> anyhow::Result<FlightController> {
    Ok(FlightController::new(
        build_link(config)?,
        Duration::from_secs_f64(config.flight.heartbeat_timeout_s),
        Duration::from_secs_f64(config.flight.ack_timeout_s),
    ))
}

fn cmd_status(config: &Config) -> anyhow::Result<i32> {
    let identity = DroneIdentity::load(&config.identity.dir)?;
    let Some(drone_id) = identity.drone_id() else {
        println!("Drone not provisioned. Run 'skysentry-node provision' first.");
        return Ok(1);
    };
    println!("Drone ID: {drone_id}");

    let mut fc = build_controller(config)?;
    println!("Connecting to vehicle ({})...", config.flight.link);
    if fc.connect().is_err() {
        println!("Could not connect to vehicle.");
        return Ok(1);
    }
    fc.drain_telemetry();
    let t = fc.telemetry();
    println!();
    println!("=== TELEMETRY ===");
    println!("  Connected:   {}", t.connected);
    println!("  Armed:       {}", t.armed);
    println!("  Mode:        {}", t.mode.map(|m| m.to_string()).unwrap_or_default());
    println!("  Position:    {:.7}, {:.7}", t.lat, t.lon);
    println!("  Altitude:    {:.1}m (rel) / {:.1}m (MSL)", t.alt_rel, t.alt_msl);
    println!("  Speed:       {:.1} m/s", t.groundspeed);
    println!(
        "  Battery:     {}% ({:.1}V)",
        t.battery_pct.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()),
        t.battery_voltage
    );
    println!("  GPS:         {}D fix, {} sats", t.gps_fix, t.gps_satellites);
    fc.disconnect();
    Ok(0)
}

fn load_waypoints(args: &[String]) -> anyhow::Result<Vec<Waypoint>> {
    let Some(path) = arg_value(args, "--waypoints") else {
        anyhow::bail!("--waypoints <file> is required");
    };
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("waypoints file {path}: {e}"))?;
    let waypoints: Vec<Waypoint> = serde_json::from_str(&raw)?;
    Ok(waypoints)
}

fn cmd_patrol(args: &[String], config: &Config, preflight_only: bool) -> anyhow::Result<i32> {
    let identity = DroneIdentity::load(&config.identity.dir)?;
    if !identity.is_provisioned() {
        println!("Drone not provisioned. Run 'skysentry-node provision' first.");
        return Ok(1);
    }
    let drone_id = identity.drone_id().unwrap_or_default().to_string();

    let waypoints = load_waypoints(args)?;
    let altitude: f64 = arg_value(args, "--altitude").map(|v| v.parse()).transpose()?.unwrap_or(30.0);
    let speed: f64 = arg_value(args, "--speed").map(|v| v.parse()).transpose()?.unwrap_or(5.0);
    let loop_route = !has_flag(args, "--no-loop");

    println!("Drone: {drone_id}");
    println!("Waypoints: {} points", waypoints.len());
    println!("Altitude: {altitude}m | Speed: {speed} m/s | Loop: {loop_route}");
    println!();

    let ids = Arc::new(IdGenerator::new());
    let engine = Arc::new(CryptoEngine::new(Arc::new(identity)));
    let store = Arc::new(DataStore::open(&config.data.db_path)?);
    let audit = Arc::new(AuditLog::new(store.clone(), engine.clone(), ids.clone(), &drone_id));

    let mut fc = build_controller(config)?;
    println!("Connecting to vehicle...");
    if let Err(e) = fc.connect() {
        println!("FAILED: cannot connect to vehicle: {e}");
        return Ok(1);
    }
    fc.drain_telemetry();

    let mission = Mission::new(
        ids.generate(),
        drone_id,
        waypoints,
        MissionParameters {
            altitude_m: altitude,
            speed_ms: speed,
            loop_route,
            detection_classes: config.vision.target_classes.clone(),
        },
    );
    store.save_mission(&mission)?;
    println!("Mission created: {}", mission.id);

    let patrol_config = PatrolConfig {
        waypoint_hover: Duration::from_secs_f64(config.patrol.waypoint_hover_s),
        detection_loiter: Duration::from_secs_f64(config.patrol.detection_loiter_s),
        rtl_battery_pct: config.patrol.rtl_battery_pct,
        min_battery_pct: config.patrol.min_battery_pct,
        waypoint_tolerance_m: config.patrol.waypoint_tolerance_m,
        alert_cooldown: Duration::from_secs_f64(config.patrol.alert_cooldown_s),
        detections_dir: config.patrol.detections_dir.clone(),
        ..PatrolConfig::default()
    };

    let mut patrol = PatrolMission::new(
        mission,
        fc,
        Box::new(SyntheticFrameSource::new(1280, 720)),
        Box::new(ScriptedDetector::idle()),
        store,
        engine,
        audit,
        None,
        ids,
        patrol_config,
    )?;

    if preflight_only {
        let issues = patrol.preflight();
        if issues.is_empty() {
            println!("Preflight: all checks passed.");
            return Ok(0);
        }
        println!("Preflight failed:");
        for issue in &issues {
            println!("  - {issue}");
        }
        return Ok(1);
    }

    println!();
    println!("=== STARTING PATROL ===");
    if let Err(e) = patrol.start() {
        println!("FAILED: {e}");
        return Ok(1);
    }
    println!("Findings: {}", patrol.findings_total());
    println!("Mission data stored locally.");
    Ok(0)
}

fn cmd_missions(config: &Config) -> anyhow::Result<i32> {
    let store = DataStore::open(&config.data.db_path)?;
    let missions = store.list_missions()?;
    if missions.is_empty() {
        println!("No missions found.");
        return Ok(0);
    }

    println!("=== MISSIONS ({}) ===", missions.len());
    println!();
    for mission in &missions {
        let findings = store.finding_count(&mission.id)?;
        println!(
            "  {}.. | {:10} | {:12} | {} wps | {} findings | {}",
            &mission.id[..8.min(mission.id.len())],
            mission.status.as_str(),
            mission.kind,
            mission.waypoints.len(),
            findings,
            mission.created_at,
        );
    }
    println!();
    Ok(0)
}

fn cmd_audit(args: &[String], config: &Config) -> anyhow::Result<i32> {
    let limit: usize = arg_value(args, "--limit").map(|v| v.parse()).transpose()?.unwrap_or(20);
    let store = DataStore::open(&config.data.db_path)?;
    let entries = store.audit_entries_desc(limit)?;
    if entries.is_empty() {
        println!("No audit entries found.");
        return Ok(0);
    }

    println!("=== AUDIT LOG (last {} entries) ===", entries.len());
    println!();
    for entry in entries.iter().rev() {
        println!(
            "  [{}] {}.. | {}",
            entry.timestamp,
            &entry.actor[..8.min(entry.actor.len())],
            entry.action
        );
        for (key, value) in &entry.details {
            println!("    {key}: {value}");
        }
    }
    println!();
    Ok(0)
}

fn cmd_verify_audit(config: &Config) -> anyhow::Result<i32> {
    let store = DataStore::open(&config.data.db_path)?;
    let entries = store.audit_entries_asc()?;
    if entries.is_empty() {
        println!("No audit entries to verify.");
        return Ok(0);
    }

    match skysentry_audit::verify_entries(&entries) {
        ChainVerdict::Intact { entries } => {
            println!("VALID: audit chain intact ({entries} entries verified)");
            Ok(0)
        }
        ChainVerdict::Broken { at } => {
            println!("TAMPERED: chain broken at entry {at}");
            println!("The audit log may have been modified.");
            Ok(1)
        }
    }
}

/// Options that consume the following argument.
const VALUE_OPTIONS: &[&str] = &[
    "--config",
    "--org-id",
    "--identity-dir",
    "--waypoints",
    "--altitude",
    "--speed",
    "--limit",
];

/// The first argument that is neither an option nor an option value.
fn find_command(args: &[String]) -> Option<&String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            return Some(arg);
        }
    }
    None
}

fn arg_value(args: &[String], name: &str) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == name {
            return iter.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}
