//! Error types for the mission layer.

use thiserror::Error;

use skysentry_audit::AuditError;
use skysentry_flight::FlightError;
use skysentry_identity::IdentityError;
use skysentry_store::StoreError;
use skysentry_vision::VisionError;

#[derive(Debug, Error)]
pub enum MissionError {
    /// Preflight found these problems; all of them, not just the first.
    #[error("Preflight failed: {}", .0.join("; "))]
    Preflight(Vec<String>),

    #[error("Flight error: {0}")]
    Flight(#[from] FlightError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Capture error: {0}")]
    Vision(#[from] VisionError),

    #[error("Evidence I/O error: {0}")]
    Io(#[from] std::io::Error),
}
