use anyhow::Result;

use crate::detect::backend::{ModelOutput, ObjectDetector};
use crate::detect::result::RawBox;
use crate::frame::Frame;

/// Backend that replays a fixed set of boxes for every frame.
///
/// Used for dry runs without a model file and in tests. Boxes below the
/// requested confidence floor are filtered the same way a real model would.
pub struct ScriptedBackend {
    output: Option<ModelOutput>,
    frames_seen: u64,
}

impl ScriptedBackend {
    pub fn new(boxes: Vec<RawBox>) -> Self {
        Self {
            output: Some(ModelOutput { boxes }),
            frames_seen: 0,
        }
    }

    /// Produces a result set with zero boxes.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Produces no result set at all.
    pub fn silent() -> Self {
        Self {
            output: None,
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl ObjectDetector for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame, confidence: f32) -> Result<Option<ModelOutput>> {
        self.frames_seen += 1;
        Ok(self.output.as_ref().map(|output| ModelOutput {
            boxes: output
                .boxes
                .iter()
                .filter(|b| b.confidence >= confidence)
                .copied()
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_confidence_floor() {
        let boxes = vec![
            RawBox {
                class_id: 41,
                confidence: 0.2,
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
            },
            RawBox {
                class_id: 41,
                confidence: 0.6,
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
            },
        ];
        let mut backend = ScriptedBackend::new(boxes);
        let frame = Frame::solid(16, 16, [0, 0, 0]);
        let out = backend.detect(&frame, 0.25).unwrap().expect("result set");
        assert_eq!(out.boxes.len(), 1);
        assert_eq!(backend.frames_seen(), 1);
        assert!(ScriptedBackend::silent().detect(&frame, 0.25).unwrap().is_none());
    }
}
