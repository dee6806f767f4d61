use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::annotate::annotate_boxes;
use super::backend::ModelOutput;
use super::color::{find_by_color, DEFAULT_MIN_AREA};
use super::labels::CUP_LABELS;
use super::lazy::LazyModel;
use super::model::{detections_from_output, select_best, LabelQuery};
use super::result::Detection;
use crate::frame::{Frame, Mask};

/// What to look for in a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Largest region of a named color.
    Color(String),
    /// Best model box whose label passes the query.
    Label(LabelQuery),
}

impl Target {
    pub fn color(name: impl Into<String>) -> Self {
        Target::Color(name.into())
    }

    /// Best cup-like box ("cup" or "wine glass").
    pub fn cup() -> Self {
        Target::Label(LabelQuery::any_of(CUP_LABELS))
    }

    pub fn text(query: impl Into<String>) -> Self {
        Target::Label(LabelQuery::Text(query.into()))
    }
}

impl FromStr for Target {
    type Err = anyhow::Error;

    /// Accepts `cup`, `color:<name>` or `label:<text>`.
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("cup") {
            return Ok(Target::cup());
        }
        match value.split_once(':') {
            Some(("color", name)) if !name.trim().is_empty() => Ok(Target::color(name.trim())),
            Some(("label", text)) if !text.trim().is_empty() => Ok(Target::text(text.trim())),
            _ => Err(anyhow!(
                "invalid target '{}'; expected cup, color:<name> or label:<text>",
                value
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Color(name) => write!(f, "color:{}", name),
            Target::Label(LabelQuery::Text(text)) => write!(f, "label:{}", text),
            Target::Label(LabelQuery::AnyOf(set)) => write!(f, "labels:{}", set.join("|")),
        }
    }
}

/// Diagnostic image returned next to a detection, for external rendering only.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticImage {
    /// Color mode: the cleaned binary mask.
    Mask(Mask),
    /// Model mode: the frame with every raw box drawn, or the untouched frame
    /// when the model produced no result set.
    Frame(Frame),
}

/// Detection facade used by the control loop.
pub struct Detector {
    model: Arc<LazyModel>,
    min_area: u64,
}

impl Detector {
    pub fn new(model: Arc<LazyModel>) -> Self {
        Self {
            model,
            min_area: DEFAULT_MIN_AREA,
        }
    }

    /// Override the minimum blob area for color mode (pixels).
    pub fn with_min_area(mut self, min_area: u64) -> Self {
        self.min_area = min_area;
        self
    }

    /// Best single target in the frame, or `None`.
    ///
    /// Color mode never touches the model. Model mode loads it on first use;
    /// a model that cannot be loaded is an error. A miss, or a single failed
    /// inference pass, is not.
    pub fn detect_best(
        &self,
        frame: &Frame,
        target: &Target,
        confidence: f32,
    ) -> Result<(Option<Detection>, DiagnosticImage)> {
        match target {
            Target::Color(color) => {
                let (detection, mask) = find_by_color(frame, color, self.min_area);
                Ok((detection, DiagnosticImage::Mask(mask)))
            }
            Target::Label(query) => {
                let Some(output) = self.infer(frame, confidence)? else {
                    return Ok((None, DiagnosticImage::Frame(frame.clone())));
                };
                let annotated = annotate_boxes(frame, &output);
                let detections = detections_from_output(&output, frame.width(), frame.height());
                let best = select_best(&detections, query);
                Ok((best, DiagnosticImage::Frame(annotated)))
            }
        }
    }

    /// Every model detection with a known label, plus the annotated frame.
    pub fn detect_all(&self, frame: &Frame, confidence: f32) -> Result<(Vec<Detection>, Frame)> {
        let Some(output) = self.infer(frame, confidence)? else {
            return Ok((Vec::new(), frame.clone()));
        };
        let detections = detections_from_output(&output, frame.width(), frame.height());
        Ok((detections, annotate_boxes(frame, &output)))
    }

    /// Errors only when the model cannot be loaded. A failed pass is logged
    /// and yields no result set for this frame.
    fn infer(&self, frame: &Frame, confidence: f32) -> Result<Option<ModelOutput>> {
        self.model.with_model(|model| match model.detect(frame, confidence) {
            Ok(output) => Ok(output),
            Err(err) => {
                log::warn!("{} inference failed, frame skipped: {:#}", model.name(), err);
                Ok(None)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::ScriptedBackend;
    use crate::detect::result::{BoundingBox, RawBox};

    fn cup_box(confidence: f32, x1: f32) -> RawBox {
        RawBox {
            class_id: 41,
            confidence,
            x1,
            y1: 100.0,
            x2: x1 + 40.0,
            y2: 160.0,
        }
    }

    fn detector_with(backend: ScriptedBackend) -> Detector {
        Detector::new(Arc::new(LazyModel::ready(backend)))
    }

    #[test]
    fn parses_targets() {
        assert_eq!("cup".parse::<Target>().unwrap(), Target::cup());
        assert_eq!("color:red".parse::<Target>().unwrap(), Target::color("red"));
        assert_eq!("label:Bottle".parse::<Target>().unwrap(), Target::text("Bottle"));
        assert!("color:".parse::<Target>().is_err());
        assert!("shape:round".parse::<Target>().is_err());
    }

    #[test]
    fn model_mode_picks_highest_confidence() {
        let detector = detector_with(ScriptedBackend::new(vec![
            cup_box(0.3, 10.0),
            cup_box(0.9, 200.0),
            cup_box(0.6, 400.0),
        ]));
        let frame = Frame::solid(640, 480, [10, 10, 10]);
        let (best, diag) = detector.detect_best(&frame, &Target::cup(), 0.25).unwrap();
        let best = best.expect("cup");
        assert_eq!(best.confidence, Some(0.9));
        assert_eq!(best.bbox, BoundingBox::new(200, 100, 40, 60));
        match diag {
            DiagnosticImage::Frame(annotated) => assert_ne!(annotated, frame),
            DiagnosticImage::Mask(_) => panic!("model mode returns a frame"),
        }
    }

    #[test]
    fn silent_model_returns_original_frame() {
        let detector = detector_with(ScriptedBackend::silent());
        let frame = Frame::solid(32, 32, [1, 2, 3]);
        let (best, diag) = detector.detect_best(&frame, &Target::cup(), 0.25).unwrap();
        assert!(best.is_none());
        assert_eq!(diag, DiagnosticImage::Frame(frame.clone()));
        let (all, annotated) = detector.detect_all(&frame, 0.25).unwrap();
        assert!(all.is_empty());
        assert_eq!(annotated, frame);
    }

    #[test]
    fn zero_boxes_is_a_miss_not_an_error() {
        let detector = detector_with(ScriptedBackend::empty());
        let frame = Frame::solid(32, 32, [1, 2, 3]);
        let (best, diag) = detector.detect_best(&frame, &Target::text("cup"), 0.25).unwrap();
        assert!(best.is_none());
        assert_eq!(diag, DiagnosticImage::Frame(frame));
    }

    #[test]
    fn color_mode_does_not_load_model() {
        let model = Arc::new(LazyModel::unavailable("no model configured"));
        let detector = Detector::new(model.clone());
        let frame = Frame::solid(40, 40, [0, 0, 0]);
        let (best, diag) = detector.detect_best(&frame, &Target::color("black"), 0.25).unwrap();
        assert!(best.is_some());
        assert!(matches!(diag, DiagnosticImage::Mask(_)));
        assert!(!model.is_loaded());

        let err = detector.detect_best(&frame, &Target::cup(), 0.25).unwrap_err();
        assert!(err.to_string().contains("no model configured"));
    }

    struct FlakyBackend;

    impl crate::detect::ObjectDetector for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn detect(&mut self, _frame: &Frame, _confidence: f32) -> Result<Option<ModelOutput>> {
            Err(anyhow!("ONNX inference failed"))
        }
    }

    #[test]
    fn failed_inference_is_a_miss() {
        let detector = Detector::new(Arc::new(LazyModel::ready(FlakyBackend)));
        let frame = Frame::solid(32, 32, [1, 2, 3]);
        let (best, diag) = detector.detect_best(&frame, &Target::cup(), 0.25).unwrap();
        assert!(best.is_none());
        assert_eq!(diag, DiagnosticImage::Frame(frame.clone()));
        let (all, annotated) = detector.detect_all(&frame, 0.25).unwrap();
        assert!(all.is_empty());
        assert_eq!(annotated, frame);
    }

    #[test]
    fn detect_all_lists_known_labels() {
        let mut boxes = vec![cup_box(0.8, 0.0)];
        boxes.push(RawBox {
            class_id: 999,
            ..cup_box(0.9, 50.0)
        });
        let detector = detector_with(ScriptedBackend::new(boxes));
        let frame = Frame::solid(320, 240, [0, 0, 0]);
        let (all, _) = detector.detect_all(&frame, 0.25).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].label, "cup");
    }
}
