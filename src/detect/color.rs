//! Color-threshold segmentation.
//!
//! Pipeline: RGB -> HSV (8-bit, hue in 0..180) -> interval mask -> 5x5 median
//! -> 8-connected blobs -> largest blob at or above the minimum area.

use image::Luma;

use crate::detect::result::{BoundingBox, Detection};
use crate::frame::{Frame, Mask};

pub const DEFAULT_MIN_AREA: u64 = 500;
pub const DEFAULT_COLOR: &str = "black";

const MEDIAN_KERNEL: u32 = 5;
const FOREGROUND: u8 = 255;

/// Inclusive HSV interval. Hue is in half-degrees (0..180).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

const BLACK: &[HsvRange] = &[HsvRange::new([0, 0, 0], [179, 255, 50])];
// Red wraps past hue 0, so it needs a low band and a high band.
const RED: &[HsvRange] = &[
    HsvRange::new([0, 120, 100], [10, 255, 255]),
    HsvRange::new([170, 120, 100], [179, 255, 255]),
];
const GREEN: &[HsvRange] = &[HsvRange::new([40, 50, 50], [80, 255, 255])];
const BLUE: &[HsvRange] = &[HsvRange::new([100, 50, 50], [130, 255, 255])];
const YELLOW: &[HsvRange] = &[HsvRange::new([20, 50, 50], [30, 255, 255])];
const ORANGE: &[HsvRange] = &[HsvRange::new([10, 50, 50], [20, 255, 255])];

/// Resolve a color name to its HSV intervals. Unknown names fall back to black;
/// the returned name is the one actually used.
pub fn hsv_ranges(color: &str) -> (&'static str, &'static [HsvRange]) {
    match color.trim().to_lowercase().as_str() {
        "black" => ("black", BLACK),
        "red" => ("red", RED),
        "green" => ("green", GREEN),
        "blue" => ("blue", BLUE),
        "yellow" => ("yellow", YELLOW),
        "orange" => ("orange", ORANGE),
        other => {
            log::debug!("unknown color '{}', using {}", other, DEFAULT_COLOR);
            (DEFAULT_COLOR, BLACK)
        }
    }
}

/// 8-bit HSV conversion: H in 0..180, S and V in 0..=255.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(i32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        (255.0 * diff as f32 / v as f32).round() as i32
    };

    let mut h = if diff == 0 {
        0.0
    } else if v == r {
        60.0 * (g - b) as f32 / diff as f32
    } else if v == g {
        120.0 + 60.0 * (b - r) as f32 / diff as f32
    } else {
        240.0 + 60.0 * (r - g) as f32 / diff as f32
    };
    if h < 0.0 {
        h += 360.0;
    }
    let mut h = (h / 2.0).round() as i32;
    if h >= 180 {
        h -= 180;
    }

    [h as u8, s as u8, v as u8]
}

/// Binary mask of pixels inside any of the intervals.
pub fn color_mask(frame: &Frame, ranges: &[HsvRange]) -> Mask {
    let image = frame.image();
    let mut mask = Mask::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let hsv = rgb_to_hsv(pixel.0);
        if ranges.iter().any(|range| range.contains(hsv)) {
            mask.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    mask
}

/// Median filter for binary masks, replicating edge pixels at the border.
pub fn median_blur(mask: &Mask, kernel: u32) -> Mask {
    let (width, height) = mask.dimensions();
    let mut out = Mask::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    let radius = (kernel / 2) as i64;
    let majority = (kernel * kernel) / 2 + 1;
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    for y in 0..height {
        for x in 0..width {
            let mut on = 0;
            for dy in -radius..=radius {
                let sy = (y as i64 + dy).clamp(0, max_y) as u32;
                for dx in -radius..=radius {
                    let sx = (x as i64 + dx).clamp(0, max_x) as u32;
                    if mask.get_pixel(sx, sy).0[0] != 0 {
                        on += 1;
                    }
                }
            }
            if on >= majority {
                out.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    out
}

/// One 8-connected foreground region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Blob {
    pub bbox: BoundingBox,
    pub area: u64,
}

/// Extract blobs in raster order of their first pixel.
pub fn find_blobs(mask: &Mask) -> Vec<Blob> {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut visited = vec![false; w * h];
    let mut blobs = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if visited[start] || mask.as_raw()[start] == 0 {
            continue;
        }
        visited[start] = true;
        stack.push(start);

        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        let mut area = 0u64;

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if !visited[n] && mask.as_raw()[n] != 0 {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        blobs.push(Blob {
            bbox: BoundingBox::new(
                min_x as i32,
                min_y as i32,
                (max_x - min_x + 1) as i32,
                (max_y - min_y + 1) as i32,
            ),
            area,
        });
    }
    blobs
}

/// Largest blob with `area >= min_area`. Ties keep the first blob found.
pub fn largest_blob(blobs: &[Blob], min_area: u64) -> Option<Blob> {
    let mut best: Option<Blob> = None;
    for blob in blobs {
        if best.map_or(true, |b| blob.area > b.area) {
            best = Some(*blob);
        }
    }
    best.filter(|b| b.area >= min_area)
}

/// Find the largest region of `color` in the frame.
///
/// Always returns the cleaned mask as the diagnostic image.
pub fn find_by_color(frame: &Frame, color: &str, min_area: u64) -> (Option<Detection>, Mask) {
    let (color, ranges) = hsv_ranges(color);
    let mask = median_blur(&color_mask(frame, ranges), MEDIAN_KERNEL);
    let blobs = find_blobs(&mask);
    let detection = largest_blob(&blobs, min_area).map(|blob| {
        log::debug!(
            "color {} blob area={} bbox={:?} ({} candidates)",
            color,
            blob.area,
            blob.bbox,
            blobs.len()
        );
        Detection::from_box(blob.bbox, color, None)
    });
    (detection, mask)
}
