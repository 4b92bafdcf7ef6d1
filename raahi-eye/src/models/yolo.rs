//! YOLO object detection model

use crate::error::VisionError;
use crate::models::{non_max_suppression, BoundingBox, RawDetection};
use crate::utils::Letterbox;

#[cfg(feature = "onnx")]
pub use onnx::YoloModel;

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Standard YOLO input size
pub const YOLO_INPUT_SIZE: (u32, u32) = (640, 640);

/// Candidates below this score never leave the decoder
pub const CANDIDATE_FLOOR: f32 = 0.25;

/// Overlap above which the weaker of two boxes is dropped
pub const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Memory layout of a raw YOLO output tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoloOutputLayout {
    /// `[1, N, 5 + C]`: cx, cy, w, h, objectness, class scores
    V5 { candidates: usize },
    /// `[1, 4 + C, N]`: cx, cy, w, h, class scores, candidate-major last
    V8 { candidates: usize },
}

impl YoloOutputLayout {
    /// Recognize the layout from a tensor shape and class count
    pub fn from_shape(shape: &[usize], num_classes: usize) -> Option<Self> {
        match shape {
            [1, n, attrs] if *attrs == 5 + num_classes => Some(Self::V5 { candidates: *n }),
            [1, attrs, n] if *attrs == 4 + num_classes => Some(Self::V8 { candidates: *n }),
            _ => None,
        }
    }
}

/// Decode a raw YOLO output into frame-space detections.
///
/// Model coordinates are in letterboxed input pixels; `letterbox` removes
/// the padding and undoes the resize. Results are clamped to the frame,
/// filtered at `min_confidence` and passed through per-class NMS.
pub fn decode_output(
    data: &[f32],
    shape: &[usize],
    num_classes: usize,
    letterbox: &Letterbox,
    frame_size: (f32, f32),
    min_confidence: f32,
) -> Result<Vec<RawDetection>, VisionError> {
    let layout = YoloOutputLayout::from_shape(shape, num_classes).ok_or_else(|| {
        VisionError::Model(format!(
            "Unrecognized YOLO output shape {:?} for {} classes",
            shape, num_classes
        ))
    })?;

    let expected: usize = shape.iter().product();
    if data.len() < expected {
        return Err(VisionError::Model(format!(
            "YOLO output has {} values, shape {:?} needs {}",
            data.len(),
            shape,
            expected
        )));
    }

    let mut detections = Vec::new();
    match layout {
        YoloOutputLayout::V5 { candidates } => {
            let stride = 5 + num_classes;
            for row in data.chunks_exact(stride).take(candidates) {
                let objectness = row[4];
                if !(objectness >= min_confidence) {
                    continue;
                }
                if let Some((class_id, score)) = best_class(&row[5..]) {
                    let confidence = objectness * score;
                    if confidence >= min_confidence {
                        detections.push(to_detection([row[0], row[1], row[2], row[3]], confidence, class_id, letterbox, frame_size));
                    }
                }
            }
        }
        YoloOutputLayout::V8 { candidates } => {
            let attr = |a: usize, i: usize| data[a * candidates + i];
            for i in 0..candidates {
                let scores = (0..num_classes).map(|c| attr(4 + c, i));
                if let Some((class_id, confidence)) = best_class_iter(scores) {
                    if confidence >= min_confidence {
                        let bbox = [attr(0, i), attr(1, i), attr(2, i), attr(3, i)];
                        detections.push(to_detection(bbox, confidence, class_id, letterbox, frame_size));
                    }
                }
            }
        }
    }

    detections.retain(|d| d.bbox.is_finite() && d.bbox.area() > 0.0);
    Ok(non_max_suppression(detections, NMS_IOU_THRESHOLD))
}

fn to_detection(
    center_form: [f32; 4],
    confidence: f32,
    class_id: usize,
    letterbox: &Letterbox,
    frame_size: (f32, f32),
) -> RawDetection {
    let [cx, cy, w, h] = center_form;
    let (cx, cy) = letterbox.to_frame(cx, cy);
    let bbox = BoundingBox::from_center(cx, cy, letterbox.length_to_frame(w), letterbox.length_to_frame(h))
        .clamp(frame_size.0, frame_size.1);
    RawDetection::new(bbox, confidence.clamp(0.0, 1.0), class_id)
}

fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
    best_class_iter(scores.iter().copied())
}

fn best_class_iter<I: Iterator<Item = f32>>(scores: I) -> Option<(usize, f32)> {
    scores
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best, (idx, score)| match best {
            Some((_, b)) if b >= score => best,
            _ => Some((idx, score)),
        })
}

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use crate::frame::Frame;
    use crate::models::ObjectDetector;
    use crate::utils::frame_to_chw_tensor;
    use ort::{GraphOptimizationLevel, Session, Tensor};
    use parking_lot::Mutex;
    use std::path::Path;
    use tracing::{debug, info};

    /// YOLO model for object detection, backed by ONNX Runtime
    pub struct YoloModel {
        session: Mutex<Session>,
        input_size: (u32, u32),
        labels: Vec<String>,
        min_confidence: f32,
    }

    impl YoloModel {
        /// Load a YOLO ONNX export trained on COCO
        pub fn new(model_path: &Path) -> Result<Self, VisionError> {
            let labels = COCO_CLASSES.iter().map(|s| s.to_string()).collect();
            Self::with_labels(model_path, labels)
        }

        /// Load a YOLO ONNX export with a custom label set
        pub fn with_labels(model_path: &Path, labels: Vec<String>) -> Result<Self, VisionError> {
            if !model_path.exists() {
                return Err(VisionError::Model(format!("Model file not found: {:?}", model_path)));
            }

            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(model_path)
                .map_err(|e| VisionError::Ort(format!("Failed to load YOLO model: {}", e)))?;

            info!("YOLO model loaded from {:?} ({} classes)", model_path, labels.len());

            Ok(Self {
                session: Mutex::new(session),
                input_size: YOLO_INPUT_SIZE,
                labels,
                min_confidence: CANDIDATE_FLOOR,
            })
        }

        /// Override the decoder's candidate floor
        pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
            self.min_confidence = min_confidence;
            self
        }
    }

    impl ObjectDetector for YoloModel {
        fn detect(&self, frame: &Frame) -> Result<Vec<RawDetection>, VisionError> {
            if frame.is_empty() {
                return Err(VisionError::Processing("Cannot run detection on an empty frame".to_string()));
            }

            let (in_w, in_h) = self.input_size;
            let (input, letterbox) = frame_to_chw_tensor(frame, in_w, in_h)?;
            let input_shape = vec![1i64, 3, in_h as i64, in_w as i64];
            let tensor = Tensor::<f32>::from_array((input_shape, input))?;

            let (shape, data) = {
                let session = self.session.lock();
                let outputs = session.run(ort::inputs![tensor]?)?;
                if outputs.is_empty() {
                    return Err(VisionError::Ort("Model produced no outputs".to_string()));
                }
                let output = outputs[0].try_extract_tensor::<f32>()?;
                let shape: Vec<usize> = output.shape().to_vec();
                let data: Vec<f32> = output.iter().copied().collect();
                (shape, data)
            };
            debug!("YOLO output shape: {:?}", shape);

            let frame_size = (frame.width() as f32, frame.height() as f32);
            let detections =
                decode_output(&data, &shape, self.labels.len(), &letterbox, frame_size, self.min_confidence)?;

            debug!("YOLO detected {} objects", detections.len());
            Ok(detections)
        }

        fn label(&self, class_id: usize) -> Option<&str> {
            self.labels.get(class_id).map(|s| s.as_str())
        }

        fn name(&self) -> &str {
            "yolo"
        }
    }
}
