//! Interfaces to the platform pieces a capture session drives.
//!
//! The camera and face detector run on the camera lane and are synchronous.
//! Scanner, crop tool and presenter are user-facing and therefore async:
//! each call completes when the user finishes the corresponding screen.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blinkcap_core::{CaptureError, CapturedImage, FaceLandmarks, RawFrame};
use thiserror::Error;

use crate::engine::FrameSink;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("landmark detection failed: {0}")]
    Failed(String),
}

/// Face and eye landmark detector.
pub trait FaceDetector: Send {
    /// Zero or more face candidates for one frame, best candidate first.
    fn detect(&mut self, frame: &RawFrame) -> Result<Vec<FaceLandmarks>, DetectorError>;
}

/// Detector shared between the camera lane and the session that owns it.
pub type SharedDetector = Arc<Mutex<Box<dyn FaceDetector>>>;

/// Push-style camera. One active session per screen.
pub trait CameraSession: Send {
    /// Configure inputs/outputs and start delivering frames into `sink`,
    /// from any thread. Only the newest frame matters; late frames may be dropped.
    fn start(&mut self, sink: FrameSink) -> Result<(), CaptureError>;

    /// Stop delivery and release inputs/outputs. Must be safe to call when
    /// already stopped.
    fn stop(&mut self);
}

/// Result of a user-driven step.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
    Failed(String),
}

#[async_trait]
pub trait DocumentScanner: Send {
    /// Present the scanner and return the first scanned page.
    async fn scan(&mut self) -> Outcome<CapturedImage>;
}

#[async_trait]
pub trait CropTool: Send {
    /// Let the user crop a region of `source`.
    async fn crop(&mut self, source: &CapturedImage) -> Outcome<CapturedImage>;
}

/// User's verdict on the frozen selfie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewDecision {
    Accept,
    Retake,
    Cancel,
}

/// Presentation adapter driven by the session.
#[async_trait]
pub trait Presenter: Send {
    /// Whether there is a surface to present capture screens on.
    fn has_surface(&self) -> bool;

    /// Show the frozen selfie with accept / retake.
    async fn review_selfie(&mut self, still: &CapturedImage) -> PreviewDecision;

    /// Crop was dismissed: ask whether to try again. `false` aborts the session.
    async fn offer_crop_retry(&mut self) -> bool;
}

/// Everything a session needs from the platform.
pub struct Collaborators {
    pub presenter: Box<dyn Presenter>,
    pub camera: Box<dyn CameraSession>,
    pub detector: SharedDetector,
    pub scanner: Box<dyn DocumentScanner>,
    pub cropper: Box<dyn CropTool>,
}

impl Collaborators {
    pub fn new(
        presenter: Box<dyn Presenter>,
        camera: Box<dyn CameraSession>,
        detector: Box<dyn FaceDetector>,
        scanner: Box<dyn DocumentScanner>,
        cropper: Box<dyn CropTool>,
    ) -> Self {
        Self {
            presenter,
            camera,
            detector: Arc::new(Mutex::new(detector)),
            scanner,
            cropper,
        }
    }
}
