//! Timed scan sessions.
//!
//! A capture thread pulls frames from a [`FrameSource`] and pushes them into
//! a bounded channel; the session drains the channel, runs detection on each
//! frame and accumulates descriptions until the deadline passes or the
//! source runs dry. Closing the channel is the only stop signal.

use crate::camera::FrameSource;
use crate::error::VisionError;
use crate::frame::Frame;
use crate::processing::DetectionPipeline;
use crate::scene::{Description, Summary};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How long to wait for the capture thread to notice the channel closed
const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a scan session
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Deduplicated descriptions in first-seen order
    pub summary: Summary,
    /// Frames that went through detection
    pub frames_processed: usize,
    /// Frames whose detection failed and were skipped
    pub frames_failed: usize,
    /// Why capture stopped early, if it did
    pub aborted: Option<String>,
}

impl ScanReport {
    /// The sentence to read aloud
    pub fn sentence(&self) -> String {
        self.summary.sentence()
    }
}

/// One scan over a frame source
pub struct ScanSession {
    pipeline: Arc<DetectionPipeline>,
    source: Box<dyn FrameSource>,
    frame_buffer: usize,
}

impl ScanSession {
    pub fn new(pipeline: Arc<DetectionPipeline>, source: Box<dyn FrameSource>) -> Self {
        let frame_buffer = pipeline.config().frame_buffer.max(1);
        Self {
            pipeline,
            source,
            frame_buffer,
        }
    }

    /// Scan for `duration`, then summarize everything seen.
    ///
    /// Never fails: a source that cannot be opened yields an empty summary
    /// with `aborted` set, and frames whose detection fails are skipped.
    pub async fn run(self, duration: Duration) -> ScanReport {
        let ScanSession {
            pipeline,
            mut source,
            frame_buffer,
        } = self;

        let source_name = source.name().to_string();
        info!("Scanning {} for {:?}", source_name, duration);

        let (tx, mut rx) = mpsc::channel::<Frame>(frame_buffer);
        let capture = tokio::task::spawn_blocking(move || capture_frames(source.as_mut(), &tx));

        let deadline = Instant::now() + duration;
        let mut descriptions: Vec<Description> = Vec::new();
        let mut report = ScanReport::default();

        loop {
            let frame = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    debug!("Scan deadline reached");
                    break;
                }
                frame = rx.recv() => match frame {
                    Some(frame) => frame,
                    None => {
                        debug!("Frame source exhausted");
                        break;
                    }
                },
            };

            let worker = pipeline.clone();
            match tokio::task::spawn_blocking(move || worker.describe(&frame)).await {
                Ok(Ok(found)) => {
                    report.frames_processed += 1;
                    descriptions.extend(found);
                }
                Ok(Err(e)) => {
                    report.frames_failed += 1;
                    warn!("Skipping frame: {}", e);
                }
                Err(e) => {
                    report.frames_failed += 1;
                    error!("Detection task failed: {}", e);
                }
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        // Dropping the receiver is what stops the capture thread
        drop(rx);

        match tokio::time::timeout(CAPTURE_JOIN_TIMEOUT, capture).await {
            Ok(Ok(Ok(sent))) => debug!("Capture from {} delivered {} frames", source_name, sent),
            Ok(Ok(Err(CaptureError::Open(e)))) => {
                error!("Could not open {}: {}", source_name, e);
                report.aborted = Some(e.to_string());
                descriptions.clear();
            }
            Ok(Ok(Err(CaptureError::Read(e)))) => {
                error!("Capture from {} stopped: {}", source_name, e);
                report.aborted = Some(e.to_string());
            }
            Ok(Err(e)) => {
                error!("Capture task failed: {}", e);
                report.aborted = Some(format!("capture task failed: {}", e));
            }
            Err(_) => warn!("Capture from {} did not stop in time, detaching", source_name),
        }

        report.summary = Summary::from_descriptions(descriptions);
        info!(
            "Scan finished: {} frames, {} distinct objects",
            report.frames_processed,
            report.summary.len()
        );
        report
    }
}

enum CaptureError {
    Open(VisionError),
    Read(VisionError),
}

fn capture_frames(source: &mut dyn FrameSource, tx: &mpsc::Sender<Frame>) -> Result<usize, CaptureError> {
    source.open().map_err(CaptureError::Open)?;

    let mut sent = 0;
    let result = loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                if tx.blocking_send(frame).is_err() {
                    break Ok(sent);
                }
                sent += 1;
            }
            Ok(None) => break Ok(sent),
            Err(e) => break Err(CaptureError::Read(e)),
        }
    };

    source.close();
    result
}
