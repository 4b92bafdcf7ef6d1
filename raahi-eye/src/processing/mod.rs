//! Vision processing pipelines

pub mod annotate;
pub mod detection;

pub use annotate::{annotate, LabelFont};
pub use detection::{describe_detections, DetectionPipeline, FrameReport, UNKNOWN_LABEL};
