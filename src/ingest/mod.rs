//! Frame ingestion sources.
//!
//! Sources hand owned RGB frames to the control loop one at a time. A source
//! returning `Ok(None)` has run dry; an `Err` is camera loss. Either ends
//! the loop.

pub mod file;

pub use file::{FileConfig, FileSource, FileStats};

use anyhow::Result;

use crate::frame::Frame;

pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
