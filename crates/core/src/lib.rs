//! Core functionality for the skysentry drone platform.
//!
//! This crate provides configuration, logging, error types, and the
//! time-ordered id generator used across the workspace.

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;

pub use config::Config;
pub use error::{Error, Result};
pub use ids::{unix_millis, IdGenerator};
