//! Label vocabulary and label matching for model mode.
//!
//! Free-text matching is deliberately loose: a query matches a class when
//! either string contains the other, case-insensitively, after the alias table
//! has been applied. "cap" resolves to "bottle", and short queries such as "a"
//! match many classes. Callers that need exact matching should use a label set.

/// Class names indexed by model class id (COCO ordering).
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Query aliases applied before substring matching. Several targets are not in
/// the vocabulary at all and are kept as-is so they can still substring-match.
const LABEL_ALIASES: [(&str, &str); 7] = [
    ("apple", "apple"),
    ("bottle", "bottle"),
    ("marker", "marker"),
    ("cube", "cube"),
    ("block", "block"),
    ("cap", "bottle"),
    ("screw", "screwdriver"),
];

/// Labels the cup finder accepts.
pub const CUP_LABELS: [&str; 2] = ["cup", "wine glass"];

/// Map a class id to its label. Out-of-range ids yield `None`.
pub fn label_for(class_id: usize) -> Option<&'static str> {
    COCO_CLASSES.get(class_id).copied()
}

/// Lowercase the query and apply the alias table.
pub fn resolve_query(query: &str) -> String {
    let lowered = query.trim().to_lowercase();
    LABEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, target)| target.to_string())
        .unwrap_or(lowered)
}

/// Bidirectional, case-insensitive substring match.
pub fn query_matches(resolved_query: &str, detected_label: &str) -> bool {
    let detected = detected_label.to_lowercase();
    detected.contains(resolved_query) || resolved_query.contains(detected.as_str())
}
