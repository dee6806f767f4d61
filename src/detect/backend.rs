use anyhow::Result;

use crate::detect::result::RawBox;
use crate::frame::Frame;

/// Boxes produced by one model pass over one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelOutput {
    pub boxes: Vec<RawBox>,
}

/// Pretrained object detector.
///
/// Implementations only read the frame; they must not keep it past `detect`.
/// Class ids index the label vocabulary in `detect::labels`; ids outside it are
/// tolerated and dropped by the caller.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model at the given confidence floor.
    ///
    /// `Ok(None)` means the model produced no result set at all, which is
    /// different from a result set with zero boxes.
    fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<Option<ModelOutput>>;

    /// Optional warm-up hook, run once right after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
