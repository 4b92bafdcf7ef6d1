// Raahi command line: narrate what the camera sees

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{program_on_path, AppConfig, Overrides};
use raahi_eye::{
    DetectionPipeline, DirectorySource, Frame, FrameSource, LabelFont, ObjectDetector, ScanSession, Summary,
};
use raahi_spk::SpeechSynthesizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "raahi")]
#[command(about = "Raahi - spoken descriptions of the objects around you", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print the narration without synthesizing speech
    #[arg(long, global = true)]
    no_speech: bool,

    /// Write synthesized audio to this file
    #[arg(long, global = true)]
    audio_out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a single picture
    Image {
        /// Image file (jpg, png, bmp)
        path: PathBuf,

        /// Save a copy with the described objects boxed
        #[arg(long)]
        annotated: Option<PathBuf>,
    },

    /// Scan for a few seconds, then describe everything seen
    Scan {
        /// Scan length in seconds
        #[arg(long, short)]
        duration: Option<f64>,

        /// Camera device index
        #[arg(long, conflicts_with = "frames")]
        camera: Option<u32>,

        /// Read frames from a directory of images instead of a camera
        #[arg(long)]
        frames: Option<PathBuf>,
    },

    /// List the voices of the configured speech engine
    Voices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    let (camera_id, scan_duration_secs) = match &cli.command {
        Commands::Scan { camera, duration, .. } => (*camera, *duration),
        _ => (None, None),
    };
    config.apply(&Overrides {
        no_speech: cli.no_speech,
        audio_out: cli.audio_out.clone(),
        camera_id,
        scan_duration_secs,
    })?;
    config.validate().map_err(anyhow::Error::msg).context("Invalid configuration")?;

    match cli.command {
        Commands::Image { path, annotated } => {
            describe_image(&config, &path, annotated.as_deref()).await?;
        }
        Commands::Scan { frames, .. } => {
            scan(&config, frames).await?;
        }
        Commands::Voices => {
            list_voices(&config).await?;
        }
    }

    Ok(())
}

/// `--verbose` forces debug output, otherwise `RUST_LOG` or info
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn describe_image(config: &AppConfig, path: &Path, annotated: Option<&Path>) -> anyhow::Result<()> {
    let frame = Frame::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut pipeline = DetectionPipeline::new(load_detector(config).await?, config.narration.clone());
    if annotated.is_some() {
        pipeline = pipeline.with_label_font(label_font(config)?);
    }
    let pipeline = Arc::new(pipeline);

    println!("📷 {} ({}x{})", path.display(), frame.width(), frame.height());
    let report = tokio::task::spawn_blocking(move || pipeline.process_frame(&frame)).await??;

    for description in &report.descriptions {
        println!("   {}", description.capitalized());
    }

    if let Some(out) = annotated {
        report.annotated.save(out)?;
        println!("🖼️  Annotated image saved to {}", out.display());
    }

    let sentence = Summary::from_descriptions(report.descriptions).sentence();
    println!("{}", sentence);
    narrate(config, &sentence).await;
    Ok(())
}

/// Configured label font, else the first system font found
fn label_font(config: &AppConfig) -> anyhow::Result<Option<LabelFont>> {
    let font = match config.vision.label_font {
        Some(ref path) => Some(
            LabelFont::load(path).with_context(|| format!("Failed to load label font {}", path.display()))?,
        ),
        None => LabelFont::system(),
    };
    if font.is_none() {
        warn!("No label font found; annotated boxes will have no labels");
    }
    Ok(font)
}

async fn scan(config: &AppConfig, frames: Option<PathBuf>) -> anyhow::Result<()> {
    let source = open_source(config, frames)?;
    let pipeline = Arc::new(DetectionPipeline::new(load_detector(config).await?, config.narration.clone()));

    let duration = config.narration.scan_duration();
    println!("🔍 Scanning for {:.1}s...", duration.as_secs_f64());
    let report = ScanSession::new(pipeline, source).run(duration).await;

    if let Some(ref reason) = report.aborted {
        eprintln!("⚠️  Scan stopped early: {}", reason);
    }
    debug!(
        "Scan processed {} frames, {} failed",
        report.frames_processed, report.frames_failed
    );

    for description in report.summary.items() {
        println!("   {}", description.capitalized());
    }

    let sentence = report.sentence();
    println!("{}", sentence);
    narrate(config, &sentence).await;
    Ok(())
}

async fn list_voices(config: &AppConfig) -> anyhow::Result<()> {
    let engine = raahi_spk::build_engine(&config.speech)?;
    if !engine.is_available() {
        anyhow::bail!("{} is not available", engine.name());
    }

    let voices = engine.list_voices().await?;
    println!("🗣️  {} ({} voices)", engine.name(), voices.len());
    for voice in voices {
        println!("   {}", voice);
    }
    Ok(())
}

fn open_source(config: &AppConfig, frames: Option<PathBuf>) -> anyhow::Result<Box<dyn FrameSource>> {
    if let Some(dir) = frames {
        let interval = Duration::from_secs_f64(1.0 / config.vision.frame_rate.max(1) as f64);
        return Ok(Box::new(DirectorySource::new(dir).with_interval(interval)));
    }
    camera_source(config)
}

#[cfg(feature = "camera")]
fn camera_source(config: &AppConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    Ok(Box::new(raahi_eye::CameraManager::new(Arc::new(config.vision.clone()))))
}

#[cfg(not(feature = "camera"))]
fn camera_source(_config: &AppConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    anyhow::bail!("raahi was built without camera support; use --frames <dir> or rebuild with `--features camera`")
}

#[cfg(feature = "onnx")]
async fn load_detector(config: &AppConfig) -> anyhow::Result<Arc<dyn ObjectDetector>> {
    let manager = raahi_eye::ModelManager::new(Arc::new(config.vision.clone()));
    let model_path = manager.get_yolo_model().await?;
    if manager.was_downloaded(&config.vision.model_file) {
        println!("📥 Downloaded {} to {}", config.vision.model_file, model_path.display());
    }
    let model = tokio::task::spawn_blocking(move || raahi_eye::YoloModel::new(&model_path)).await??;
    info!("Detector ready: {}", model.name());
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
async fn load_detector(_config: &AppConfig) -> anyhow::Result<Arc<dyn ObjectDetector>> {
    anyhow::bail!("raahi was built without object detection; rebuild with `--features onnx`")
}

/// Speak `sentence`. Failures are reported and otherwise ignored.
async fn narrate(config: &AppConfig, sentence: &str) {
    if !config.speech.enabled {
        return;
    }

    match speak(config, sentence).await {
        Ok(Some(path)) => println!("🔊 Audio written to {}", path.display()),
        Ok(None) => {}
        Err(e) => eprintln!("❌ Speech failed: {:#}", e),
    }
}

async fn speak(config: &AppConfig, sentence: &str) -> anyhow::Result<Option<PathBuf>> {
    let synthesizer = SpeechSynthesizer::new(config.speech.clone())?;
    let extension = synthesizer.audio_format().extension();

    let Some(plan) = config.output.plan(extension, program_on_path) else {
        info!("No audio player found; set --audio-out or output.player to hear the narration");
        return Ok(None);
    };

    let audio = synthesizer.speak(sentence).await?;
    tokio::fs::write(&plan.path, &audio)
        .await
        .with_context(|| format!("Failed to write audio to {}", plan.path.display()))?;
    debug!("Wrote {} bytes from {}", audio.len(), synthesizer.engine_name());

    if let Some(ref player) = plan.player {
        play(player, &plan.path).await?;
    }
    Ok(Some(plan.path))
}

async fn play(player: &str, path: &Path) -> anyhow::Result<()> {
    let mut parts = player.split_whitespace();
    let program = parts.next().context("Player command is empty")?;

    let status = tokio::process::Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .await
        .with_context(|| format!("Failed to run player '{}'", program))?;

    if !status.success() {
        anyhow::bail!("Player '{}' exited with {}", program, status);
    }
    Ok(())
}
