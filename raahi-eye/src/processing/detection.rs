//! Object detection pipeline: raw detector output to narrated descriptions

use crate::config::NarrationConfig;
use crate::error::VisionError;
use crate::frame::Frame;
use crate::models::{sort_by_confidence, ObjectDetector, RawDetection};
use crate::processing::annotate::{annotate, LabelFont};
use crate::scene::Description;
use std::sync::Arc;
use tracing::debug;

/// Label used when a detector has no name for a class index
pub const UNKNOWN_LABEL: &str = "object";

/// Result of narrating a single frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Descriptions in confidence order
    pub descriptions: Vec<Description>,
    /// Copy of the frame with the described objects boxed and labelled
    pub annotated: Frame,
}

/// Reduce one frame's detections to descriptions.
///
/// Only the `max_detections` most confident detections are considered,
/// whatever order they arrive in; of those, anything under
/// `confidence_threshold` is dropped. Returns the survivors alongside their
/// descriptions so callers can draw them.
pub fn describe_detections<'a, F>(
    mut detections: Vec<RawDetection>,
    frame_width: u32,
    frame_height: u32,
    config: &NarrationConfig,
    label_of: F,
) -> Vec<(RawDetection, Description)>
where
    F: Fn(usize) -> Option<&'a str>,
{
    if frame_width == 0 || frame_height == 0 {
        return Vec::new();
    }

    sort_by_confidence(&mut detections);
    detections.truncate(config.max_detections);

    let (width, height) = (frame_width as f64, frame_height as f64);
    detections
        .into_iter()
        // NaN confidences fail this comparison and are dropped
        .filter(|d| d.confidence >= config.confidence_threshold)
        .map(|d| {
            let (cx, cy) = d.bbox.pixel_center();
            let label = label_of(d.class_id).unwrap_or(UNKNOWN_LABEL);
            let description = Description::locate(label, cx as f64, cy as f64, width, height);
            (d, description)
        })
        .collect()
}

/// Object detection pipeline
pub struct DetectionPipeline {
    detector: Arc<dyn ObjectDetector>,
    config: NarrationConfig,
    label_font: Option<LabelFont>,
}

impl DetectionPipeline {
    /// Create a new detection pipeline around an explicitly constructed detector
    pub fn new(detector: Arc<dyn ObjectDetector>, config: NarrationConfig) -> Self {
        Self {
            detector,
            config,
            label_font: None,
        }
    }

    /// Font for the labels written above annotated boxes; without one only
    /// the boxes are drawn
    pub fn with_label_font(mut self, font: Option<LabelFont>) -> Self {
        self.label_font = font;
        self
    }

    pub fn config(&self) -> &NarrationConfig {
        &self.config
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Run the detector and reduce its output, without annotating
    pub fn describe(&self, frame: &Frame) -> Result<Vec<Description>, VisionError> {
        Ok(self
            .detect(frame)?
            .into_iter()
            .map(|(_, description)| description)
            .collect())
    }

    /// Narrate a single frame: descriptions plus an annotated copy
    pub fn process_frame(&self, frame: &Frame) -> Result<FrameReport, VisionError> {
        let survivors = self.detect(frame)?;
        let objects: Vec<_> = survivors.iter().map(|(d, desc)| (d.bbox, desc.label.as_str())).collect();
        let annotated = annotate(frame, &objects, self.label_font.as_ref());
        let descriptions = survivors.into_iter().map(|(_, description)| description).collect();
        Ok(FrameReport { descriptions, annotated })
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<(RawDetection, Description)>, VisionError> {
        if frame.is_empty() {
            return Err(VisionError::Processing("Cannot run detection on an empty frame".to_string()));
        }

        debug!("Running object detection on frame with {}", self.detector.name());
        let raw = self.detector.detect(frame)?;
        debug!("Detector returned {} candidates", raw.len());

        let detector = self.detector.as_ref();
        let survivors = describe_detections(raw, frame.width(), frame.height(), &self.config, |id| {
            detector.label(id)
        });
        debug!("Narrating {} objects", survivors.len());
        Ok(survivors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use crate::scene::{Distance, Position};

    const LABELS: [&str; 3] = ["person", "bicycle", "car"];

    fn label(id: usize) -> Option<&'static str> {
        LABELS.get(id).copied()
    }

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: usize) -> RawDetection {
        RawDetection::new(BoundingBox::new(x1, y1, x2, y2), confidence, class_id)
    }

    fn descriptions(detections: Vec<RawDetection>, config: &NarrationConfig) -> Vec<Description> {
        describe_detections(detections, 600, 400, config, label)
            .into_iter()
            .map(|(_, d)| d)
            .collect()
    }

    #[test]
    fn test_threshold_excludes_low_confidence() {
        let config = NarrationConfig::default();
        let out = descriptions(
            vec![det(0.0, 0.0, 100.0, 100.0, 0.39, 0), det(0.0, 0.0, 100.0, 100.0, 0.4, 1)],
            &config,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "bicycle");
    }

    #[test]
    fn test_only_top_n_considered_regardless_of_order() {
        let config = NarrationConfig {
            max_detections: 2,
            ..NarrationConfig::default()
        };
        let out = descriptions(
            vec![
                det(0.0, 0.0, 10.0, 10.0, 0.5, 0),
                det(0.0, 0.0, 10.0, 10.0, 0.9, 1),
                det(0.0, 0.0, 10.0, 10.0, 0.7, 2),
            ],
            &config,
        );
        let labels: Vec<_> = out.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["bicycle", "car"]);
    }

    #[test]
    fn test_top_n_applies_before_threshold() {
        // The low-confidence detection occupies a top-N slot and is then dropped
        let config = NarrationConfig {
            max_detections: 1,
            confidence_threshold: 0.95,
            ..NarrationConfig::default()
        };
        let out = descriptions(
            vec![det(0.0, 0.0, 10.0, 10.0, 0.9, 0), det(0.0, 0.0, 10.0, 10.0, 0.8, 1)],
            &config,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_center_is_truncated_and_bucketed() {
        let config = NarrationConfig::default();
        // Center (449, 349) in a 600x400 frame: right third, ratio 0.8725
        let out = descriptions(vec![det(400.9, 300.0, 498.9, 398.7, 0.8, 2)], &config);
        assert_eq!(out[0], Description::new("car", Distance::VeryClose, Position::Right));
    }

    #[test]
    fn test_unknown_class_falls_back() {
        let config = NarrationConfig::default();
        let out = descriptions(vec![det(0.0, 0.0, 10.0, 10.0, 0.8, 42)], &config);
        assert_eq!(out[0].label, UNKNOWN_LABEL);
        assert_eq!(out[0].to_string(), "object far away at your left");
    }

    #[test]
    fn test_nan_confidence_dropped() {
        let config = NarrationConfig::default();
        let out = descriptions(vec![det(0.0, 0.0, 10.0, 10.0, f32::NAN, 0)], &config);
        assert!(out.is_empty());
    }

    #[test]
    fn test_zero_sized_frame_yields_nothing() {
        let config = NarrationConfig::default();
        let out = describe_detections(vec![det(0.0, 0.0, 1.0, 1.0, 0.9, 0)], 0, 0, &config, label);
        assert!(out.is_empty());
    }
}
