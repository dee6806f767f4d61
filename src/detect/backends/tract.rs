#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::{ModelOutput, ObjectDetector};
use crate::detect::result::RawBox;
use crate::frame::Frame;

const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const MAX_DETECTIONS: usize = 300;
const BOX_CHANNELS: usize = 4;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single output of shape `[1, 4 + classes, anchors]` (or its
/// transpose) holding center-format boxes followed by per-class scores, as
/// exported by the usual YOLOv8 tooling. Frames are stretched to the square
/// model input and boxes are scaled back to frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    input_size: u32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = image::imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        confidence: f32,
        frame: &Frame,
    ) -> Result<Vec<RawBox>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not rank 3")?;
        let shape = view.shape();
        let channel_major = shape[1] <= shape[2];
        let (channels, anchors) = if channel_major {
            (shape[1], shape[2])
        } else {
            (shape[2], shape[1])
        };
        if channels <= BOX_CHANNELS {
            return Err(anyhow!("model output has {} channels, expected > 4", channels));
        }
        let at = |c: usize, i: usize| {
            if channel_major {
                view[[0, c, i]]
            } else {
                view[[0, i, c]]
            }
        };

        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;
        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class_id, score) = (BOX_CHANNELS..channels)
                .map(|c| (c - BOX_CHANNELS, at(c, i)))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
            if !score.is_finite() || score < confidence {
                continue;
            }
            let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
            candidates.push(RawBox {
                class_id,
                confidence: score,
                x1: (cx - w / 2.0) * scale_x,
                y1: (cy - h / 2.0) * scale_y,
                x2: (cx + w / 2.0) * scale_x,
                y2: (cy + h / 2.0) * scale_y,
            });
        }
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl ObjectDetector for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<Option<ModelOutput>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let boxes = self.decode(outputs, confidence, frame)?;
        Ok(Some(ModelOutput { boxes }))
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = Frame::solid(side, side, [114, 114, 114]);
        self.detect(&blank, 1.0).map(|_| ())
    }
}

/// Greedy per-class suppression, highest confidence first.
fn non_max_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawBox> = Vec::new();
    for candidate in boxes {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
            if kept.len() >= MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}

fn iou(a: &RawBox, b: &RawBox) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = ix * iy;
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
