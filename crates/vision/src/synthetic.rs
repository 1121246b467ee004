//! Built-in collaborator doubles.
//!
//! A synthetic frame source and a scripted detector, used by the sim
//! link mode of the node binary and by scenario tests. Real deployments
//! plug in a camera-backed source and a model-backed detector instead.

use std::collections::VecDeque;

use crate::detect::{Detection, FrameSource, ObjectDetector};
use crate::frame::Frame;
use crate::VisionError;

/// Frame source that synthesizes solid frames on demand.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    open: bool,
    started: bool,
    frame_id: u64,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, open: false, started: false, frame_id: 0 }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn open(&mut self) -> Result<(), VisionError> {
        self.open = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), VisionError> {
        if !self.open {
            self.open()?;
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn latest(&mut self) -> Option<(Frame, u64)> {
        if !self.started {
            return None;
        }
        self.frame_id += 1;
        let shade = (self.frame_id % 256) as u8;
        Some((Frame::solid(self.width, self.height, [shade, shade, shade]), self.frame_id))
    }
}

/// Detector that replays a prepared script of detection lists, then
/// reports nothing. An empty script is a ready backend that never
/// detects.
pub struct ScriptedDetector {
    script: VecDeque<Vec<Detection>>,
    ready: bool,
}

impl ScriptedDetector {
    /// Ready backend with no detections.
    pub fn idle() -> Self {
        Self { script: VecDeque::new(), ready: true }
    }

    /// Ready backend replaying the given detection lists in order.
    pub fn with_script(script: Vec<Vec<Detection>>) -> Self {
        Self { script: script.into(), ready: true }
    }

    /// Backend that failed to load.
    pub fn not_ready() -> Self {
        Self { script: VecDeque::new(), ready: false }
    }
}

impl ObjectDetector for ScriptedDetector {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn detect(&mut self, _frame: &Frame) -> Vec<Detection> {
        self.script.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_source_lifecycle() {
        let mut source = SyntheticFrameSource::new(64, 48);
        assert!(!source.is_open());
        assert!(source.latest().is_none());

        source.start().unwrap();
        assert!(source.is_open());
        let (frame, id) = source.latest().unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(id, 1);
        let (_, id2) = source.latest().unwrap();
        assert_eq!(id2, 2);

        source.stop();
        assert!(source.latest().is_none());
    }

    #[test]
    fn test_scripted_detector_replays_then_idles() {
        let det = Detection {
            class_name: "person".to_string(),
            class_id: 0,
            confidence: 0.8,
            x1: 0,
            y1: 0,
            x2: 5,
            y2: 5,
        };
        let mut detector = ScriptedDetector::with_script(vec![vec![det.clone()], vec![]]);
        let frame = Frame::solid(8, 8, [0, 0, 0]);
        assert!(detector.is_ready());
        assert_eq!(detector.detect(&frame), vec![det]);
        assert!(detector.detect(&frame).is_empty());
        assert!(detector.detect(&frame).is_empty());
    }

    #[test]
    fn test_not_ready_backend() {
        assert!(!ScriptedDetector::not_ready().is_ready());
    }
}
