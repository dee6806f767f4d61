//! Model-mode selection: label mapping and best-box choice.

use crate::detect::backend::ModelOutput;
use crate::detect::labels::{label_for, query_matches, resolve_query};
use crate::detect::result::Detection;

/// Which model labels a best-box search accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelQuery {
    /// Exact membership in a fixed set of vocabulary labels.
    AnyOf(Vec<String>),
    /// Loose free-text match (alias table + bidirectional substring).
    Text(String),
}

impl LabelQuery {
    pub fn any_of<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(labels.into_iter().map(Into::into).collect())
    }

    fn accepts(&self, resolved_text: Option<&str>, label: &str) -> bool {
        match self {
            LabelQuery::AnyOf(set) => set.iter().any(|l| l == label),
            LabelQuery::Text(_) => resolved_text.is_some_and(|q| query_matches(q, label)),
        }
    }
}

/// Convert every box with a known class id into a detection.
/// Unknown class ids are dropped silently.
pub fn detections_from_output(output: &ModelOutput, width: u32, height: u32) -> Vec<Detection> {
    output
        .boxes
        .iter()
        .filter_map(|raw| {
            let label = label_for(raw.class_id)?;
            Some(Detection::from_box(
                raw.to_bounding_box(width, height),
                label,
                Some(raw.confidence),
            ))
        })
        .collect()
}

/// Highest-confidence detection accepted by `query`. Exact ties keep the first seen.
pub fn select_best(detections: &[Detection], query: &LabelQuery) -> Option<Detection> {
    let resolved = match query {
        LabelQuery::Text(text) => Some(resolve_query(text)),
        LabelQuery::AnyOf(_) => None,
    };
    let mut best: Option<&Detection> = None;
    for det in detections {
        if !query.accepts(resolved.as_deref(), &det.label) {
            continue;
        }
        let conf = det.confidence.unwrap_or(0.0);
        if best.map_or(true, |b| conf > b.confidence.unwrap_or(0.0)) {
            best = Some(det);
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, RawBox};

    fn raw(class_id: usize, confidence: f32, x1: f32) -> RawBox {
        RawBox {
            class_id,
            confidence,
            x1,
            y1: 10.0,
            x2: x1 + 20.0,
            y2: 40.0,
        }
    }

    #[test]
    fn picks_maximum_confidence() {
        let output = ModelOutput {
            boxes: vec![raw(41, 0.3, 0.0), raw(41, 0.9, 100.0), raw(41, 0.6, 200.0)],
        };
        let dets = detections_from_output(&output, 640, 480);
        let best = select_best(&dets, &LabelQuery::any_of(["cup"])).expect("cup");
        assert_eq!(best.confidence, Some(0.9));
        assert_eq!(best.bbox, BoundingBox::new(100, 10, 20, 30));
        assert_eq!((best.cx, best.cy), (110, 25));
    }

    #[test]
    fn exact_ties_keep_first_seen() {
        let output = ModelOutput {
            boxes: vec![raw(41, 0.7, 0.0), raw(40, 0.7, 100.0)],
        };
        let dets = detections_from_output(&output, 640, 480);
        let best = select_best(&dets, &LabelQuery::any_of(["cup", "wine glass"])).expect("best");
        assert_eq!(best.label, "cup");
    }

    #[test]
    fn out_of_vocabulary_ids_are_dropped() {
        let output = ModelOutput {
            boxes: vec![raw(80, 0.99, 0.0), raw(500, 0.99, 0.0), raw(39, 0.4, 0.0)],
        };
        let dets = detections_from_output(&output, 640, 480);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "bottle");
    }

    #[test]
    fn label_set_filters_other_classes() {
        let output = ModelOutput {
            boxes: vec![raw(0, 0.95, 0.0), raw(45, 0.9, 0.0)],
        };
        let dets = detections_from_output(&output, 640, 480);
        assert!(select_best(&dets, &LabelQuery::any_of(["cup"])).is_none());
    }

    #[test]
    fn text_query_uses_alias_table() {
        let output = ModelOutput {
            boxes: vec![raw(41, 0.8, 0.0), raw(39, 0.5, 50.0)],
        };
        let dets = detections_from_output(&output, 640, 480);
        let best = select_best(&dets, &LabelQuery::Text("Cap".into())).expect("bottle");
        assert_eq!(best.label, "bottle");
    }
}
