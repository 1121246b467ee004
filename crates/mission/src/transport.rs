//! Payload contracts for the external publish/subscribe transport.
//!
//! The transport itself (broker, QoS, reconnects) is outside the core;
//! this module defines what the core publishes. Publish failures are
//! reported as `false` and are never fatal to a mission.

use serde::{Deserialize, Serialize};

use skysentry_flight::TelemetryState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// A signed detection alert. Every field is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub finding_id: String,
    pub mission_id: String,
    pub timestamp: u64,
    pub detection_class: String,
    pub confidence: f64,
    pub location: GeoPoint,
    pub image_hash: String,
    pub signature: String,
}

/// Mission status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub mission_id: String,
    pub status: String,
    pub findings_total: usize,
}

/// Outbound publish channel to the ground station.
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    fn publish_alert(&self, alert: &AlertPayload) -> bool;

    fn publish_status(&self, status: &StatusPayload) -> bool;

    fn publish_telemetry(&self, telemetry: &TelemetryState) -> bool;
}
