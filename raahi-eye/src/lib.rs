//! raahi-eye: vision side of the Raahi navigation assistant
//!
//! Pulls frames from a camera, a still picture or a directory of images,
//! runs a pretrained object detector over them and reduces the detections
//! to short spoken descriptions such as "person close at your left".
//!
//! The detector is always constructed by the caller and handed in as an
//! `Arc<dyn ObjectDetector>`; scan sessions share it with their detection
//! tasks.

pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod models;
pub mod processing;
pub mod scan;
pub mod scene;
pub mod utils;

pub use camera::{DirectorySource, FrameSource, MemorySource, StillImageSource};
#[cfg(feature = "camera")]
pub use camera::CameraManager;
pub use config::{NarrationConfig, VisionConfig};
pub use error::VisionError;
pub use frame::Frame;
pub use models::{BoundingBox, ModelManager, ObjectDetector, RawDetection};
#[cfg(feature = "onnx")]
pub use models::YoloModel;
pub use processing::{DetectionPipeline, FrameReport, LabelFont};
pub use scan::{ScanReport, ScanSession};
pub use scene::{compose_sentence, Description, Distance, Position, Summary};
pub use utils::Letterbox;
