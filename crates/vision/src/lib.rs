//! Vision boundary types.
//!
//! Frames, detections, and the collaborator traits behind which frame
//! acquisition and the detection backend live. Which concrete backend is
//! active is a construction-time choice made outside the core; the
//! mission layer only sees these interfaces.

pub mod detect;
pub mod frame;
pub mod synthetic;

pub use detect::{Detection, FrameSource, ObjectDetector};
pub use frame::Frame;
pub use synthetic::{ScriptedDetector, SyntheticFrameSource};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VisionError {
    #[error("Frame buffer size {actual} does not match {width}x{height} RGB ({expected})")]
    InvalidDimensions {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Capture error: {0}")]
    Capture(String),
}
