//! Object detection.
//!
//! Two strategies run over a single frame:
//! - color mode: HSV thresholding and blob extraction (`color`)
//! - model mode: a pretrained box detector behind `ObjectDetector` (`model`)
//!
//! `Detector` is the facade the control loop uses. It owns no global state;
//! the model is injected as a shared `LazyModel`.

pub mod annotate;
mod backend;
pub mod backends;
pub mod color;
mod detector;
pub mod labels;
mod lazy;
pub mod model;
mod result;

pub use backend::{ModelOutput, ObjectDetector};
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::{Detector, DiagnosticImage, Target};
pub use lazy::LazyModel;
pub use model::LabelQuery;
pub use result::{BoundingBox, Detection, RawBox};
