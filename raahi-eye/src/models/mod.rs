//! Object detectors and model management

pub mod manager;
pub mod yolo;

pub use manager::ModelManager;
pub use yolo::{COCO_CLASSES, YoloOutputLayout};
#[cfg(feature = "onnx")]
pub use yolo::YoloModel;

use crate::error::VisionError;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixels, corner form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from center form (cx, cy, w, h)
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Center on the integer pixel grid: corners are truncated first,
    /// then halved with floor division.
    pub fn pixel_center(&self) -> (i64, i64) {
        let (x1, y1, x2, y2) = (
            self.x1 as i64,
            self.y1 as i64,
            self.x2 as i64,
            self.y2 as i64,
        );
        ((x1 + x2).div_euclid(2), (y1 + y2).div_euclid(2))
    }

    /// Clamp to a `width` x `height` frame
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    /// Intersection over union; 0.0 for degenerate or non-finite boxes
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if !self.is_finite() || !other.is_finite() {
            return 0.0;
        }

        let inter_x_min = self.x1.max(other.x1);
        let inter_y_min = self.y1.max(other.y1);
        let inter_x_max = self.x2.min(other.x2);
        let inter_y_max = self.y2.min(other.y2);

        if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
            return 0.0;
        }

        let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
        let union_area = self.area() + other.area() - inter_area;

        if union_area <= 0.0 || !union_area.is_finite() {
            return 0.0;
        }

        (inter_area / union_area).clamp(0.0, 1.0)
    }
}

/// One object instance as reported by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

impl RawDetection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

/// A pretrained object detector.
///
/// Detectors are constructed explicitly by the caller and shared by
/// reference; nothing in this crate caches one behind the caller's back.
pub trait ObjectDetector: Send + Sync {
    /// Detect objects in a frame
    fn detect(&self, frame: &Frame) -> Result<Vec<RawDetection>, VisionError>;

    /// Human readable label for a class index
    fn label(&self, class_id: usize) -> Option<&str>;

    /// Detector name for logging
    fn name(&self) -> &str;
}

/// Sort by confidence, highest first, then greedily drop boxes overlapping
/// a kept box of the same class by more than `iou_threshold`. Boxes of
/// different classes never suppress each other.
pub fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.retain(|d| d.confidence.is_finite() && d.bbox.is_finite());
    sort_by_confidence(&mut detections);

    let mut keep: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = keep
            .iter()
            .any(|kept| kept.class_id == candidate.class_id && kept.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// Stable descending sort on confidence; NaN sorts last
pub fn sort_by_confidence(detections: &mut [RawDetection]) {
    detections.sort_by(|a, b| match (a.confidence.is_nan(), b.confidence.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b
            .confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal),
    });
}
