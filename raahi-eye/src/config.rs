//! Configuration for raahi-eye

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default YOLO weights file name inside `model_path`
pub const DEFAULT_MODEL_FILE: &str = "yolov5s.onnx";

/// Vision system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// USB camera device index (0, 1, 2, etc.)
    pub camera_id: u32,
    /// Target frame rate (frames per second)
    pub frame_rate: u32,
    /// Camera resolution (width, height)
    pub resolution: (u32, u32),
    /// Directory holding downloaded models
    pub model_path: PathBuf,
    /// Detector weights file, relative to `model_path`
    pub model_file: String,
    /// TrueType font for annotation labels; common system fonts are tried when unset
    pub label_font: Option<PathBuf>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        let model_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".raahi");
                p.push("models");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models"));

        Self {
            camera_id: 0,
            frame_rate: 30,
            resolution: (640, 480),
            model_path,
            model_file: DEFAULT_MODEL_FILE.to_string(),
            label_font: None,
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err("Frame rate must be between 1 and 120".to_string());
        }

        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err("Resolution must be non-zero".to_string());
        }

        if self.resolution.0 > 7680 || self.resolution.1 > 4320 {
            return Err("Resolution too large (max 8K)".to_string());
        }

        if self.camera_id > 100 {
            return Err("Camera ID too large (max 100)".to_string());
        }

        if self.model_file.is_empty()
            || self.model_file.contains("..")
            || self.model_file.contains('/')
            || self.model_file.contains('\\')
        {
            return Err("Model file must be a plain file name".to_string());
        }

        Ok(())
    }

    /// Full path of the detector weights
    pub fn model_file_path(&self) -> PathBuf {
        self.model_path.join(&self.model_file)
    }
}

/// How object descriptions are turned into narration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Detections below this confidence are not narrated
    pub confidence_threshold: f32,
    /// Only the N most confident detections of a frame are considered
    pub max_detections: usize,
    /// Length of a scan session in milliseconds
    pub scan_duration_ms: u64,
    /// Capacity of the frame channel between capture and detection
    pub frame_buffer: usize,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            max_detections: 6,
            scan_duration_ms: 3_000,
            frame_buffer: 4,
        }
    }
}

impl NarrationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence_threshold.is_finite() || !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be between 0.0 and 1.0".to_string());
        }

        if self.max_detections == 0 {
            return Err("Max detections must be greater than 0".to_string());
        }

        if self.scan_duration_ms == 0 || self.scan_duration_ms > 600_000 {
            return Err("Scan duration must be between 1 ms and 10 minutes".to_string());
        }

        if self.frame_buffer == 0 || self.frame_buffer > 1024 {
            return Err("Frame buffer must be between 1 and 1024".to_string());
        }

        Ok(())
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = VisionConfig::default();
        assert_eq!(config.camera_id, 0);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.resolution, (640, 480));
        assert_eq!(config.model_file, DEFAULT_MODEL_FILE);
        assert!(config.label_font.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_frame_rate() {
        let mut config = VisionConfig::default();
        config.frame_rate = 0;
        assert!(config.validate().is_err());

        config.frame_rate = 121;
        assert!(config.validate().is_err());

        config.frame_rate = 120;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_resolution() {
        let mut config = VisionConfig::default();
        config.resolution = (0, 480);
        assert!(config.validate().is_err());

        config.resolution = (7681, 4320);
        assert!(config.validate().is_err());

        config.resolution = (1, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_model_file() {
        let mut config = VisionConfig::default();
        config.model_file = "../evil.onnx".to_string();
        assert!(config.validate().is_err());

        config.model_file = "sub/model.onnx".to_string();
        assert!(config.validate().is_err());

        config.model_file = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_file_path() {
        let mut config = VisionConfig::default();
        config.model_path = PathBuf::from("/opt/models");
        config.model_file = "yolov8n.onnx".to_string();
        assert_eq!(config.model_file_path(), PathBuf::from("/opt/models/yolov8n.onnx"));
    }

    #[test]
    fn test_narration_defaults() {
        let config = NarrationConfig::default();
        assert_eq!(config.confidence_threshold, 0.4);
        assert_eq!(config.max_detections, 6);
        assert_eq!(config.scan_duration(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_narration_validation() {
        let mut config = NarrationConfig::default();
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        config = NarrationConfig::default();
        config.confidence_threshold = f32::NAN;
        assert!(config.validate().is_err());

        config = NarrationConfig::default();
        config.max_detections = 0;
        assert!(config.validate().is_err());

        config = NarrationConfig::default();
        config.scan_duration_ms = 0;
        assert!(config.validate().is_err());

        config = NarrationConfig::default();
        config.frame_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: NarrationConfig = serde_json::from_str(r#"{"max_detections": 3}"#).unwrap();
        assert_eq!(config.max_detections, 3);
        assert_eq!(config.confidence_threshold, 0.4);
    }
}
