//! Configuration management for the skysentry node.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityConfig,
    pub data: DataConfig,
    pub flight: FlightConfig,
    pub vision: VisionConfig,
    pub patrol: PatrolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub dir: PathBuf,
    pub org_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/etc/skysentry/identity"),
            org_id: "skysentry".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub db_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("/var/skysentry/missions.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Link driver selector. `sim` runs the built-in simulated vehicle.
    pub link: String,
    pub heartbeat_timeout_s: f64,
    pub ack_timeout_s: f64,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            link: "sim".to_string(),
            heartbeat_timeout_s: 5.0,
            ack_timeout_s: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub confidence_threshold: f64,
    pub target_classes: Vec<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            target_classes: vec!["person".to_string(), "vehicle".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    pub waypoint_hover_s: f64,
    pub detection_loiter_s: f64,
    pub rtl_battery_pct: u8,
    pub min_battery_pct: u8,
    pub waypoint_tolerance_m: f64,
    pub alert_cooldown_s: f64,
    pub detections_dir: PathBuf,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            waypoint_hover_s: 5.0,
            detection_loiter_s: 10.0,
            rtl_battery_pct: 25,
            min_battery_pct: 30,
            waypoint_tolerance_m: 2.0,
            alert_cooldown_s: 30.0,
            detections_dir: PathBuf::from("/var/skysentry/detections"),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}
