//! Error types for flight protocol operations.

use thiserror::Error;

use crate::link::CommandId;
use crate::modes::FlightMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlightError {
    #[error("No heartbeat from vehicle within {timeout_ms}ms")]
    ConnectionFailure { timeout_ms: u64 },

    #[error("Not connected to vehicle")]
    NotConnected,

    #[error("Command {command:?} rejected by vehicle (code {code})")]
    CommandRejected { command: CommandId, code: u8 },

    #[error("Timed out waiting for acknowledgement of {command:?}")]
    AckTimeout { command: CommandId },

    #[error("Mode change to {requested:?} not confirmed by telemetry")]
    ModeChangeUnconfirmed { requested: FlightMode },

    #[error("Unknown flight mode: {0}")]
    UnknownMode(String),

    #[error("Link error: {0}")]
    Link(String),
}
