use image::{Rgb, RgbImage};

use crate::detect::backend::ModelOutput;
use crate::frame::Frame;

const PALETTE: [[u8; 3]; 6] = [
    [0, 255, 0],
    [255, 128, 0],
    [0, 160, 255],
    [255, 0, 255],
    [255, 255, 0],
    [0, 255, 255],
];

/// Copy of `frame` with every raw model box outlined, colored by class id.
pub fn annotate_boxes(frame: &Frame, output: &ModelOutput) -> Frame {
    let mut image = frame.image().clone();
    for raw in &output.boxes {
        let color = Rgb(PALETTE[raw.class_id % PALETTE.len()]);
        draw_rectangle(
            &mut image,
            raw.x1.round() as i32,
            raw.y1.round() as i32,
            raw.x2.round() as i32,
            raw.y2.round() as i32,
            color,
        );
    }
    Frame::from(image)
}

fn draw_rectangle(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgb<u8>,
) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    if width == 0 || height == 0 {
        return;
    }
    let left = left.clamp(0, width - 1);
    let right = right.clamp(0, width - 1);
    let top = top.clamp(0, height - 1);
    let bottom = bottom.clamp(0, height - 1);

    for x in left..=right {
        image.put_pixel(x as u32, top as u32, color);
        image.put_pixel(x as u32, bottom as u32, color);
    }
    for y in top..=bottom {
        image.put_pixel(left as u32, y as u32, color);
        image.put_pixel(right as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::RawBox;

    #[test]
    fn outlines_boxes_without_touching_source() {
        let frame = Frame::solid(20, 20, [0, 0, 0]);
        let output = ModelOutput {
            boxes: vec![RawBox {
                class_id: 0,
                confidence: 0.9,
                x1: 2.0,
                y1: 3.0,
                x2: 30.0,
                y2: 10.0,
            }],
        };
        let annotated = annotate_boxes(&frame, &output);
        assert_eq!(annotated.image().get_pixel(2, 3).0, PALETTE[0]);
        assert_eq!(annotated.image().get_pixel(19, 10).0, PALETTE[0]);
        assert_eq!(annotated.image().get_pixel(5, 5).0, [0, 0, 0]);
        assert_eq!(frame.image().get_pixel(2, 3).0, [0, 0, 0]);
    }
}
