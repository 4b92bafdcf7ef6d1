//! Basic example of using raahi-eye: narrate a single picture
//!
//! cargo run -p raahi-eye --features onnx --example basic_vision -- photo.jpg

use raahi_eye::{
    DetectionPipeline, Frame, LabelFont, ModelManager, NarrationConfig, ObjectDetector, Summary, VisionConfig,
    YoloModel,
};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let picture = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("Usage: basic_vision <picture>")?;

    // Fetch the detector weights on first run
    let vision_config = Arc::new(VisionConfig::default());
    let model_path = ModelManager::new(vision_config).get_yolo_model().await?;

    let detector: Arc<dyn ObjectDetector> = Arc::new(YoloModel::new(&model_path)?);
    let pipeline = DetectionPipeline::new(detector, NarrationConfig::default()).with_label_font(LabelFont::system());

    let frame = Frame::open(&picture)?;
    let report = pipeline.process_frame(&frame)?;

    for description in &report.descriptions {
        println!("- {}", description.capitalized());
    }
    println!("{}", Summary::from_descriptions(report.descriptions).sentence());

    report.annotated.save(&picture.with_extension("annotated.png"))?;
    Ok(())
}
