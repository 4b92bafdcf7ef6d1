//! Utility functions for vision processing

use crate::error::VisionError;
use crate::frame::Frame;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Upper bound on tensor elements accepted from a model input size
const MAX_TENSOR_ELEMENTS: u64 = 100_000_000;

/// Gray used for letterbox padding, as in YOLOv5 training
pub const LETTERBOX_FILL: u8 = 114;

/// How a frame was fitted into a model input: uniform scale, then centered
/// with padding on the short side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Model pixels per frame pixel
    pub ratio: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Model coordinates are frame coordinates
    pub fn identity() -> Self {
        Self {
            ratio: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        }
    }

    /// Fit a `frame_width` x `frame_height` frame into `target_width` x `target_height`
    pub fn fit(frame_width: u32, frame_height: u32, target_width: u32, target_height: u32) -> Self {
        if frame_width == 0 || frame_height == 0 {
            return Self::identity();
        }
        let ratio = (target_width as f32 / frame_width as f32).min(target_height as f32 / frame_height as f32);
        let (new_w, new_h) = Self::scaled(frame_width, frame_height, ratio, target_width, target_height);
        Self {
            ratio,
            pad_x: ((target_width - new_w) / 2) as f32,
            pad_y: ((target_height - new_h) / 2) as f32,
        }
    }

    fn scaled(frame_width: u32, frame_height: u32, ratio: f32, target_width: u32, target_height: u32) -> (u32, u32) {
        let new_w = ((frame_width as f32 * ratio).round() as u32).clamp(1, target_width);
        let new_h = ((frame_height as f32 * ratio).round() as u32).clamp(1, target_height);
        (new_w, new_h)
    }

    /// Map a model-space point back onto the frame
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.ratio, (y - self.pad_y) / self.ratio)
    }

    /// Map a model-space length back onto the frame
    pub fn length_to_frame(&self, length: f32) -> f32 {
        length / self.ratio
    }
}

/// Letterbox a frame to `target_width` x `target_height` and lay it out as
/// a planar RGB float tensor `[3, H, W]` normalized to `[0, 1]`.
pub fn frame_to_chw_tensor(
    frame: &Frame,
    target_width: u32,
    target_height: u32,
) -> Result<(Vec<f32>, Letterbox), VisionError> {
    if target_width == 0 || target_height == 0 {
        return Err(VisionError::Processing("Target dimensions cannot be zero".to_string()));
    }

    let total = (target_width as u64) * (target_height as u64) * 3;
    if total > MAX_TENSOR_ELEMENTS {
        return Err(VisionError::Processing("Target dimensions too large (max 100M elements)".to_string()));
    }

    if frame.is_empty() {
        return Err(VisionError::Processing("Invalid image dimensions".to_string()));
    }

    let letterbox = Letterbox::fit(frame.width(), frame.height(), target_width, target_height);
    let canvas = if frame.width() == target_width && frame.height() == target_height {
        frame.image().clone()
    } else {
        let (new_w, new_h) =
            Letterbox::scaled(frame.width(), frame.height(), letterbox.ratio, target_width, target_height);
        let resized = imageops::resize(frame.image(), new_w, new_h, FilterType::Triangle);
        let mut canvas = RgbImage::from_pixel(target_width, target_height, Rgb([LETTERBOX_FILL; 3]));
        imageops::replace(&mut canvas, &resized, letterbox.pad_x as i64, letterbox.pad_y as i64);
        canvas
    };

    let plane = (target_width as usize) * (target_height as usize);
    let mut tensor = vec![0.0f32; plane * 3];
    for (i, pixel) in canvas.pixels().enumerate() {
        for channel in 0..3 {
            tensor[channel * plane + i] = pixel.0[channel] as f32 / 255.0;
        }
    }

    Ok((tensor, letterbox))
}
