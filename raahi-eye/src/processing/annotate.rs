//! Box and label drawing for on-screen display

use crate::error::VisionError;
use crate::frame::Frame;
use crate::models::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::path::Path;
use tracing::debug;

/// Outline and label color for detected objects
pub const BOX_COLOR: Rgb<u8> = Rgb([36, 255, 12]);

/// Outline thickness in pixels
pub const BOX_THICKNESS: u32 = 2;

/// Label text height in pixels
pub const LABEL_SCALE: f32 = 20.0;

/// Gap between the label baseline and the top of its box
const LABEL_OFFSET: i32 = 10;

/// Fonts tried by [`LabelFont::system`], in order
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// TrueType font used to write class labels above boxes
#[derive(Clone)]
pub struct LabelFont {
    font: Font<'static>,
}

impl LabelFont {
    /// Load a TrueType or OpenType font file
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
            .ok_or_else(|| VisionError::Config(format!("Not a usable font file: {:?}", path)))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        Font::try_from_vec(bytes).map(|font| Self { font })
    }

    /// First common system font that loads, if any
    pub fn system() -> Option<Self> {
        SYSTEM_FONTS
            .iter()
            .map(Path::new)
            .filter(|path| path.exists())
            .find_map(|path| Self::load(path).ok())
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont").finish_non_exhaustive()
    }
}

/// Copy `frame`, outline every object on the copy and, when a font is
/// available, write its label just above the box.
pub fn annotate<S: AsRef<str>>(frame: &Frame, objects: &[(BoundingBox, S)], font: Option<&LabelFont>) -> Frame {
    let mut annotated = frame.clone();
    for (bbox, label) in objects {
        draw_rectangle(annotated.image_mut(), bbox, BOX_COLOR, BOX_THICKNESS);
        match font {
            Some(font) => draw_label(annotated.image_mut(), bbox, label.as_ref(), font),
            None => debug!("No label font, drawing box only for {}", label.as_ref()),
        }
    }
    annotated
}

/// Draw a hollow rectangle `thickness` pixels wide, growing inwards.
/// Parts outside the image are clipped.
pub fn draw_rectangle(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    if !bbox.is_finite() || image.width() == 0 || image.height() == 0 {
        return;
    }

    // Edges beyond the image stay outside it, inner rings included
    let t = thickness as f32;
    let max_x = image.width() as f32 - 1.0 + t;
    let max_y = image.height() as f32 - 1.0 + t;
    let x1 = bbox.x1.min(bbox.x2).clamp(-t, max_x) as i32;
    let y1 = bbox.y1.min(bbox.y2).clamp(-t, max_y) as i32;
    let x2 = bbox.x1.max(bbox.x2).clamp(-t, max_x) as i32;
    let y2 = bbox.y1.max(bbox.y2).clamp(-t, max_y) as i32;

    for inset in 0..thickness as i32 {
        let (w, h) = (x2 - x1 + 1 - 2 * inset, y2 - y1 + 1 - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Top-left corner for a label whose baseline sits `LABEL_OFFSET` pixels
/// above the box
pub fn label_origin(bbox: &BoundingBox) -> (i32, i32) {
    let x = bbox.x1.min(bbox.x2) as i32;
    let y = bbox.y1.min(bbox.y2) as i32 - LABEL_OFFSET - LABEL_SCALE as i32;
    (x, y)
}

fn draw_label(image: &mut RgbImage, bbox: &BoundingBox, label: &str, font: &LabelFont) {
    if !bbox.is_finite() || label.is_empty() {
        return;
    }
    let (x, y) = label_origin(bbox);
    draw_text_mut(image, BOX_COLOR, x, y, Scale::uniform(LABEL_SCALE), &font.font, label);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black(width: u32, height: u32) -> Frame {
        Frame::new(RgbImage::new(width, height))
    }

    fn boxes(bboxes: &[BoundingBox]) -> Vec<(BoundingBox, &'static str)> {
        bboxes.iter().map(|b| (*b, "person")).collect()
    }

    #[test]
    fn test_outline_only() {
        let frame = black(20, 20);
        let out = annotate(&frame, &boxes(&[BoundingBox::new(2.0, 2.0, 12.0, 12.0)]), None);

        assert_eq!(*out.image().get_pixel(2, 2), BOX_COLOR);
        assert_eq!(*out.image().get_pixel(3, 7), BOX_COLOR);
        assert_eq!(*out.image().get_pixel(12, 12), BOX_COLOR);
        assert_eq!(*out.image().get_pixel(11, 5), BOX_COLOR);
        // Interior and exterior untouched
        assert_eq!(out.image().get_pixel(7, 7).0, [0, 0, 0]);
        assert_eq!(out.image().get_pixel(15, 15).0, [0, 0, 0]);
    }

    #[test]
    fn test_source_frame_unchanged() {
        let frame = black(10, 10);
        let _ = annotate(&frame, &boxes(&[BoundingBox::new(0.0, 0.0, 9.0, 9.0)]), None);
        assert!(frame.image().pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_clips_out_of_bounds_box() {
        let frame = black(10, 10);
        let out = annotate(&frame, &boxes(&[BoundingBox::new(-5.0, -5.0, 50.0, 50.0)]), None);
        // Every edge lies outside the frame
        assert_eq!(out.image().get_pixel(0, 5).0, [0, 0, 0]);
        assert_eq!(out.image().get_pixel(9, 9).0, [0, 0, 0]);
    }

    #[test]
    fn test_non_finite_box_ignored() {
        let frame = black(5, 5);
        let out = annotate(&frame, &boxes(&[BoundingBox::new(f32::NAN, 0.0, 4.0, 4.0)]), None);
        assert!(out.image().pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_label_sits_above_box() {
        let bbox = BoundingBox::new(40.7, 100.2, 90.0, 150.0);
        assert_eq!(label_origin(&bbox), (40, 70));
    }

    #[test]
    fn test_label_drawn_above_box() {
        // Only meaningful where a system font is installed
        let Some(font) = LabelFont::system() else {
            return;
        };
        let frame = black(200, 120);
        let bbox = BoundingBox::new(20.0, 60.0, 120.0, 110.0);
        let out = annotate(&frame, &[(bbox, "person")], Some(&font));

        let mut above = (20..120).flat_map(|x| (0..50).map(move |y| (x, y)));
        assert!(above.any(|(x, y)| *out.image().get_pixel(x, y) != Rgb([0, 0, 0])));
    }

    #[test]
    fn test_rejects_non_font_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"definitely not a font").unwrap();
        assert!(LabelFont::load(file.path()).is_err());
        assert!(LabelFont::load(Path::new("/nonexistent/font.ttf")).is_err());
    }
}
