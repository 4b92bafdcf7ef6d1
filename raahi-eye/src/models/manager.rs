//! Model manager with auto-download functionality

use crate::config::VisionConfig;
use crate::error::VisionError;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Known detector weights: file name, download URL, SHA-256 (empty skips the check)
const KNOWN_MODELS: &[(&str, &str, &str)] = &[
    (
        "yolov5s.onnx",
        "https://github.com/ultralytics/yolov5/releases/download/v7.0/yolov5s.onnx",
        "",
    ),
    (
        "yolov8n.onnx",
        "https://github.com/ultralytics/assets/releases/download/v8.2.0/yolov8n.onnx",
        "",
    ),
];

const MAX_MODEL_SIZE: usize = 2_000_000_000;
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Model manager for downloading and locating detector weights
pub struct ModelManager {
    config: Arc<VisionConfig>,
    downloaded: RwLock<HashSet<String>>,
}

impl ModelManager {
    /// Create a new model manager
    pub fn new(config: Arc<VisionConfig>) -> Self {
        Self {
            config,
            downloaded: RwLock::new(HashSet::new()),
        }
    }

    /// Ensure model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        let model_path = &self.config.model_path;
        if !model_path.exists() {
            fs::create_dir_all(model_path)?;
            info!("Created model directory: {:?}", model_path);
        }
        Ok(model_path.clone())
    }

    /// Download model if not present
    pub async fn ensure_model(&self, model_name: &str, url: &str, checksum: &str) -> Result<PathBuf, VisionError> {
        if model_name.is_empty() || model_name.len() > 255 {
            return Err(VisionError::Model("Invalid model name".to_string()));
        }

        if model_name.contains("..") || model_name.contains('/') || model_name.contains('\\') {
            return Err(VisionError::Model("Model name contains invalid characters".to_string()));
        }

        if url.is_empty() || url.len() > 2048 {
            return Err(VisionError::Model("Invalid URL".to_string()));
        }

        if !url.starts_with("https://") {
            return Err(VisionError::Model("Only HTTPS URLs are allowed for model downloads".to_string()));
        }

        self.ensure_model_dir()?;

        let model_path = self.config.model_path.join(model_name);
        if model_path.exists() {
            info!("Model {} already exists at {:?}", model_name, model_path);
            return Ok(model_path);
        }

        info!("Downloading model {} from {}", model_name, url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(VisionError::Model(format!("Failed to download model: HTTP {}", response.status())));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_MODEL_SIZE as u64 {
                return Err(VisionError::Model(format!(
                    "Model too large: {} bytes (max {} bytes)",
                    content_length, MAX_MODEL_SIZE
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_MODEL_SIZE {
            return Err(VisionError::Model(format!(
                "Downloaded model too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_MODEL_SIZE
            )));
        }

        // Anything this small is an error page, not weights
        if bytes.len() < 1024 {
            return Err(VisionError::Model("Downloaded file too small, likely corrupted".to_string()));
        }

        verify_checksum(model_name, &bytes, checksum)?;

        let temp_path = model_path.with_extension("tmp");
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &model_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(VisionError::Io(e));
        }

        self.downloaded.write().insert(model_name.to_string());
        info!("Model {} saved to {:?}", model_name, model_path);
        Ok(model_path)
    }

    /// Path of the configured detector weights, downloading known models on first use
    pub async fn get_yolo_model(&self) -> Result<PathBuf, VisionError> {
        let name = self.config.model_file.as_str();
        let local = self.config.model_file_path();
        if local.exists() {
            return Ok(local);
        }

        match KNOWN_MODELS.iter().find(|(file, _, _)| *file == name) {
            Some((file, url, checksum)) => self.ensure_model(file, url, checksum).await,
            None => Err(VisionError::Model(format!(
                "Model {:?} not found and no download source is known for it",
                local
            ))),
        }
    }

    /// True if this manager fetched the model during its lifetime
    pub fn was_downloaded(&self, model_name: &str) -> bool {
        self.downloaded.read().contains(model_name)
    }
}

fn verify_checksum(model_name: &str, bytes: &[u8], checksum: &str) -> Result<(), VisionError> {
    if checksum.is_empty() {
        info!("Downloaded {} bytes for model {} (checksum verification skipped)", bytes.len(), model_name);
        return Ok(());
    }

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let computed = hex::encode(hasher.finalize());
    if !computed.eq_ignore_ascii_case(checksum) {
        return Err(VisionError::Model(format!(
            "Checksum mismatch for model {}: expected {}, got {}",
            model_name, checksum, computed
        )));
    }
    info!("Verified checksum for model {}", model_name);
    Ok(())
}
