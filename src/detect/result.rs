/// Axis-aligned box in pixel units. `(x, y)` is the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Center point: top-left plus half the size, floored.
    pub fn centroid(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// One detected object in one frame. Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub cx: i32,
    pub cy: i32,
    pub bbox: BoundingBox,
    /// Color name (color mode) or model class name (model mode).
    pub label: String,
    /// Detector confidence in [0, 1]. `None` for color detections, which are unscored.
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn from_box(bbox: BoundingBox, label: impl Into<String>, confidence: Option<f32>) -> Self {
        let (cx, cy) = bbox.centroid();
        Self {
            cx,
            cy,
            bbox,
            label: label.into(),
            confidence,
        }
    }
}

/// Raw model output for one box, before label mapping.
///
/// Corner coordinates are absolute pixels in the frame that was passed to the
/// detector. `class_id` indexes the label vocabulary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawBox {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl RawBox {
    /// Convert corners into an integer box clipped to the frame.
    ///
    /// Coordinates truncate toward zero; width and height come from the
    /// corner difference after clipping.
    pub fn to_bounding_box(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        let max_x = frame_width as f32;
        let max_y = frame_height as f32;
        let x1 = self.x1.clamp(0.0, max_x);
        let y1 = self.y1.clamp(0.0, max_y);
        let x2 = self.x2.clamp(0.0, max_x).max(x1);
        let y2 = self.y2.clamp(0.0, max_y).max(y1);
        BoundingBox::new(x1 as i32, y1 as i32, (x2 - x1) as i32, (y2 - y1) as i32)
    }
}
