//! Binary for downloading detector weights from command line

use raahi_eye::config::{VisionConfig, DEFAULT_MODEL_FILE};
use raahi_eye::error::VisionError;
use raahi_eye::models::ModelManager;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), VisionError> {
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 || args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("Usage: download_model [model_file]");
        eprintln!("Known models: yolov5s.onnx (default), yolov8n.onnx");
        std::process::exit(1);
    }

    let mut config = VisionConfig::default();
    config.model_file = args.get(1).cloned().unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string());
    config.validate().map_err(VisionError::Config)?;
    let model_file = config.model_file.clone();

    let manager = ModelManager::new(Arc::new(config));
    println!("Fetching detector weights...");
    let path = manager.get_yolo_model().await?;
    if manager.was_downloaded(&model_file) {
        println!("Downloaded {} to {:?}", model_file, path);
    } else {
        println!("Already present at {:?}", path);
    }

    Ok(())
}
