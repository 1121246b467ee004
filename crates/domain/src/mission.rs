//! Mission definition and lifecycle status.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use skysentry_core::unix_millis;

use crate::error::DomainError;

/// Mission lifecycle status.
///
/// Transitions: Draft → Active ⇄ Paused → (Completed | Aborted).
/// Completed and Aborted are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Aborted,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Draft => "draft",
            MissionStatus::Active => "active",
            MissionStatus::Paused => "paused",
            MissionStatus::Completed => "completed",
            MissionStatus::Aborted => "aborted",
        }
    }

    /// Whether the lifecycle state machine permits moving to `to`.
    pub fn can_transition(&self, to: MissionStatus) -> bool {
        use MissionStatus::*;
        matches!(
            (self, to),
            (Draft, Active)
                | (Draft, Aborted)
                | (Active, Paused)
                | (Active, Completed)
                | (Active, Aborted)
                | (Paused, Active)
                | (Paused, Aborted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Aborted)
    }
}

impl FromStr for MissionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(MissionStatus::Draft),
            "active" => Ok(MissionStatus::Active),
            "paused" => Ok(MissionStatus::Paused),
            "completed" => Ok(MissionStatus::Completed),
            "aborted" => Ok(MissionStatus::Aborted),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// A patrol waypoint. Altitude falls back to the mission default when
/// absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

/// Tunable mission parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionParameters {
    pub altitude_m: f64,
    pub speed_ms: f64,
    #[serde(rename = "loop")]
    pub loop_route: bool,
    pub detection_classes: Vec<String>,
}

impl Default for MissionParameters {
    fn default() -> Self {
        Self {
            altitude_m: 30.0,
            speed_ms: 5.0,
            loop_route: true,
            detection_classes: vec!["person".to_string(), "vehicle".to_string()],
        }
    }
}

/// A patrol mission definition.
///
/// Waypoints are fixed at creation; only status changes afterwards, and
/// only through the mission controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub kind: String,
    pub status: MissionStatus,
    pub created_at: u64,
    pub created_by: String,
    pub waypoints: Vec<Waypoint>,
    pub parameters: MissionParameters,
}

impl Mission {
    pub fn new(
        id: String,
        created_by: impl Into<String>,
        waypoints: Vec<Waypoint>,
        parameters: MissionParameters,
    ) -> Self {
        Self {
            id,
            kind: "surveillance".to_string(),
            status: MissionStatus::Draft,
            created_at: unix_millis(),
            created_by: created_by.into(),
            waypoints,
            parameters,
        }
    }
}
