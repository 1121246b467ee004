//! Error types for domain model parsing.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown mission status: {0}")]
    UnknownStatus(String),
}
