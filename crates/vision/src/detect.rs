//! Detection types and collaborator traits.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::VisionError;

/// A single detected object in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub class_id: u32,
    pub confidence: f64,
    /// Bounding box, pixel coordinates: top-left (x1, y1) to
    /// bottom-right (x2, y2).
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Detection {
    pub fn center(&self) -> (u32, u32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.x2.saturating_sub(self.x1)) * u64::from(self.y2.saturating_sub(self.y1))
    }
}

/// Detection backend. One method; the concrete implementation (and any
/// fallback chain inside it) is chosen at construction time by the
/// caller.
pub trait ObjectDetector: Send {
    /// Whether a model is loaded and ready to run.
    fn is_ready(&self) -> bool;

    /// Run detection on one frame.
    fn detect(&mut self, frame: &Frame) -> Vec<Detection>;
}

/// Frame acquisition device.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), VisionError>;

    /// Begin producing frames. Opens the device if needed.
    fn start(&mut self) -> Result<(), VisionError>;

    fn stop(&mut self);

    fn is_open(&self) -> bool;

    /// The latest complete frame and its sequence number, if any.
    fn latest(&mut self) -> Option<(Frame, u64)>;
}
