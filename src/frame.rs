//! Owned video frames.
//!
//! - `Frame`: one 3-channel, byte-per-pixel image in RGB order.
//! - `Mask`: single-channel binary image (0 or 255) produced by color segmentation.
//!
//! Frames are plain values. The detector reads them, the annotator copies them,
//! nothing in the core keeps a frame beyond the call that received it.

use anyhow::{anyhow, Result};
use image::{GrayImage, RgbImage};

/// Single-channel binary image. Foreground pixels are 255, background 0.
pub type Mask = GrayImage;

/// One RGB frame from the camera collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap raw RGB bytes (row-major, 3 bytes per pixel).
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("failed to build {}x{} frame", width, height))?;
        Ok(Self { image })
    }

    /// Frame filled with a single color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Paint an axis-aligned rectangle (inclusive of its top-left corner,
    /// exclusive of its bottom-right). Out-of-frame parts are clipped.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgb: [u8; 3]) {
        let right = x.saturating_add(w).min(self.width());
        let bottom = y.saturating_add(h).min(self.height());
        for py in y..bottom {
            for px in x..right {
                self.image.put_pixel(px, py, image::Rgb(rgb));
            }
        }
    }

    /// Mirror the frame left-to-right, the way a user-facing camera preview is shown.
    pub fn mirrored(&self) -> Self {
        Self {
            image: image::imageops::flip_horizontal(&self.image),
        }
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self { image }
    }
}
