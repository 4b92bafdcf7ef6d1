//! Frame sources: USB webcam capture, still pictures, image directories

use crate::error::VisionError;
use crate::frame::Frame;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(feature = "camera")]
pub use self::webcam::CameraManager;

/// Image extensions picked up by [`DirectorySource`]
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Anything that can hand out frames one at a time.
///
/// Sources are driven from a blocking thread, so `next_frame` may block
/// until a frame is ready.
pub trait FrameSource: Send {
    /// Acquire the underlying device or files
    fn open(&mut self) -> Result<(), VisionError>;

    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>, VisionError>;

    /// Name for logging
    fn name(&self) -> &str;

    /// Release the underlying device
    fn close(&mut self) {}
}

enum StillOrigin {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A single picture, yielded once
pub struct StillImageSource {
    origin: StillOrigin,
    frame: Option<Frame>,
    name: String,
}

impl StillImageSource {
    /// Picture stored on disk
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("image:{}", path.display());
        Self {
            origin: StillOrigin::Path(path),
            frame: None,
            name,
        }
    }

    /// Encoded picture already in memory (JPEG, PNG, BMP)
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            origin: StillOrigin::Bytes(bytes),
            frame: None,
            name: "image:memory".to_string(),
        }
    }
}

impl FrameSource for StillImageSource {
    fn open(&mut self) -> Result<(), VisionError> {
        let frame = match &self.origin {
            StillOrigin::Path(path) => Frame::open(path)?,
            StillOrigin::Bytes(bytes) => Frame::decode(bytes)?,
        };
        debug!("Loaded still picture {}x{}", frame.width(), frame.height());
        self.frame = Some(frame);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, VisionError> {
        Ok(self.frame.take())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Image files of a directory, played back in file name order
pub struct DirectorySource {
    dir: PathBuf,
    files: VecDeque<PathBuf>,
    interval: Option<Duration>,
    name: String,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = format!("frames:{}", dir.display());
        Self {
            dir,
            files: VecDeque::new(),
            interval: None,
            name,
        }
    }

    /// Pause between frames to imitate a live camera
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Frames left to play
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

impl FrameSource for DirectorySource {
    fn open(&mut self) -> Result<(), VisionError> {
        if !self.dir.is_dir() {
            return Err(VisionError::Camera(format!("Frame directory {:?} does not exist", self.dir)));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!("Playing {} frames from {:?}", files.len(), self.dir);
        self.files = files.into();
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, VisionError> {
        while let Some(path) = self.files.pop_front() {
            if let Some(interval) = self.interval {
                std::thread::sleep(interval);
            }
            match Frame::open(&path) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => warn!("Skipping unreadable frame {:?}: {}", path, e),
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {
        self.files.clear();
    }
}

/// Frames handed over up front
pub struct MemorySource {
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn open(&mut self) -> Result<(), VisionError> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, VisionError> {
        Ok(self.frames.pop_front())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(feature = "camera")]
mod webcam {
    use super::FrameSource;
    use crate::config::VisionConfig;
    use crate::error::VisionError;
    use crate::frame::Frame;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tracing::{error, info, warn};

    const MAX_READ_RETRIES: u32 = 10;

    /// Camera manager for USB webcam capture
    pub struct CameraManager {
        config: Arc<VisionConfig>,
        capture: Option<VideoCapture>,
        name: String,
        last_frame: Option<Instant>,
    }

    impl CameraManager {
        /// Create a new camera manager
        pub fn new(config: Arc<VisionConfig>) -> Self {
            let name = format!("camera:{}", config.camera_id);
            Self {
                config,
                capture: None,
                name,
                last_frame: None,
            }
        }

        fn frame_interval(&self) -> Duration {
            let frame_rate = self.config.frame_rate.max(1);
            Duration::from_secs_f64(1.0 / frame_rate as f64)
        }

        fn read_mat(&mut self) -> Result<Option<Mat>, VisionError> {
            let capture = self
                .capture
                .as_mut()
                .ok_or_else(|| VisionError::Camera("Camera not initialized".to_string()))?;

            let mut frame = Mat::default();
            if !capture.read(&mut frame)? || frame.rows() == 0 || frame.cols() == 0 {
                return Ok(None);
            }
            Ok(Some(frame))
        }

        fn to_frame(bgr: &Mat) -> Result<Frame, VisionError> {
            let mut rgb = Mat::default();
            imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
            if !rgb.is_continuous() {
                rgb = rgb.try_clone()?;
            }

            let width = rgb.cols() as u32;
            let height = rgb.rows() as u32;
            Frame::from_rgb(width, height, rgb.data_bytes()?.to_vec())
        }
    }

    impl FrameSource for CameraManager {
        /// Initialize camera
        fn open(&mut self) -> Result<(), VisionError> {
            if self.capture.is_some() {
                return Ok(());
            }

            let camera_id = self.config.camera_id;
            let mut capture = VideoCapture::new(camera_id as i32, CAP_ANY)
                .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", camera_id, e)))?;

            if !capture
                .is_opened()
                .map_err(|e| VisionError::Camera(format!("Camera {} not opened: {}", camera_id, e)))?
            {
                return Err(VisionError::Camera(format!("Camera {} failed to open", camera_id)));
            }

            let (width, height) = self.config.resolution;
            capture
                .set(CAP_PROP_FRAME_WIDTH, width as f64)
                .map_err(|e| VisionError::Camera(format!("Failed to set width: {}", e)))?;
            capture
                .set(CAP_PROP_FRAME_HEIGHT, height as f64)
                .map_err(|e| VisionError::Camera(format!("Failed to set height: {}", e)))?;
            capture
                .set(CAP_PROP_FPS, self.config.frame_rate as f64)
                .map_err(|e| VisionError::Camera(format!("Failed to set FPS: {}", e)))?;

            self.capture = Some(capture);
            info!(
                "Camera {} initialized at {}x{} @ {}fps",
                camera_id, width, height, self.config.frame_rate
            );
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, VisionError> {
            if let Some(last) = self.last_frame {
                let elapsed = last.elapsed();
                let interval = self.frame_interval();
                if elapsed < interval {
                    std::thread::sleep(interval - elapsed);
                }
            }

            let mut retries = 0;
            loop {
                match self.read_mat() {
                    Ok(Some(mat)) => {
                        self.last_frame = Some(Instant::now());
                        return Self::to_frame(&mat).map(Some);
                    }
                    Ok(None) => warn!("Camera {} returned an empty frame", self.config.camera_id),
                    Err(e) => error!("Camera read error: {}", e),
                }

                retries += 1;
                if retries > MAX_READ_RETRIES {
                    return Err(VisionError::Camera(format!(
                        "Too many camera read errors ({}), giving up",
                        retries
                    )));
                }

                // Exponential backoff: 100ms, 200ms, 400ms, etc., max 5s
                let backoff_ms = (100u64 * (1 << retries.min(5))).min(5000);
                std::thread::sleep(Duration::from_millis(backoff_ms));
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn close(&mut self) {
            if self.capture.take().is_some() {
                info!("Camera {} stopped", self.config.camera_id);
            }
        }
    }

    impl Drop for CameraManager {
        fn drop(&mut self) {
            self.close();
        }
    }
}
