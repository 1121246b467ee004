//! Error types for identity operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Drone not provisioned")]
    NotProvisioned,

    #[error("Drone already provisioned: {drone_id}")]
    AlreadyProvisioned { drone_id: String },

    #[error("Corrupt identity material: {0}")]
    CorruptMaterial(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
