//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blinkcap_core::{
    CaptureError, CapturedImage, FaceLandmarks, Orientation, PixelFormat, Point2D, RawFrame,
};
use image::{DynamicImage, Rgb, RgbImage};

use crate::collaborators::{
    CameraSession, Collaborators, CropTool, DetectorError, DocumentScanner, FaceDetector,
    Outcome, PreviewDecision, Presenter, SharedDetector,
};
use crate::engine::FrameSink;

pub const OPEN: f32 = 0.3;
pub const SHUT: f32 = 0.05;

/// Face whose eyes both have the given averaged EAR.
pub fn face_with_openness(openness: f32) -> FaceLandmarks {
    let eye = |cx: f32| {
        let gap = openness * 0.4 / 2.0;
        vec![
            Point2D::new(cx - 0.2, 0.5),
            Point2D::new(cx - 0.05, 0.5 + gap),
            Point2D::new(cx + 0.05, 0.5 + gap),
            Point2D::new(cx + 0.2, 0.5),
            Point2D::new(cx - 0.05, 0.5 - gap),
            Point2D::new(cx + 0.05, 0.5 - gap),
        ]
    };
    FaceLandmarks {
        confidence: 0.9,
        left_eye: Some(eye(0.3)),
        right_eye: Some(eye(0.7)),
        ..Default::default()
    }
}

/// 2x2 BGRA frame filled with `marker` in every colour channel.
pub fn frame(timestamp_ms: u64, marker: u8) -> RawFrame {
    RawFrame {
        width: 2,
        height: 2,
        format: PixelFormat::Bgra8,
        data: [marker, marker, marker, 255].repeat(4),
        orientation: Orientation::default(),
        timestamp: Duration::from_millis(timestamp_ms),
    }
}

/// Marker value of a still frozen from [`frame`].
pub fn marker(still: &CapturedImage) -> u8 {
    still.image().to_rgb8().get_pixel(0, 0).0[0]
}

/// Flat RGB image, used as scans and crops.
pub fn solid(width: u32, height: u32, value: u8) -> CapturedImage {
    CapturedImage::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb([value, value, value]),
    )))
}

enum Script {
    /// One entry per detect call; `Ok(None)` means no face. No face once exhausted.
    Sequence(VecDeque<Result<Option<f32>, String>>),
    /// Openness as a function of the frame timestamp.
    ByTimestamp(fn(Duration) -> Option<f32>),
}

pub struct ScriptedDetector {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl Default for ScriptedDetector {
    fn default() -> Self {
        Self::from_script(Vec::new())
    }
}

impl ScriptedDetector {
    pub fn from_script(script: Vec<Result<Option<f32>, String>>) -> Self {
        Self {
            script: Script::Sequence(script.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_openness(values: Vec<f32>) -> Self {
        Self::from_script(values.into_iter().map(|v| Ok(Some(v))).collect())
    }

    pub fn by_timestamp(f: fn(Duration) -> Option<f32>) -> Self {
        Self {
            script: Script::ByTimestamp(f),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn shared(self) -> SharedDetector {
        Arc::new(Mutex::new(Box::new(self)))
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, frame: &RawFrame) -> Result<Vec<FaceLandmarks>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = match &mut self.script {
            Script::Sequence(queue) => queue.pop_front().unwrap_or(Ok(None)),
            Script::ByTimestamp(f) => Ok(f(frame.timestamp)),
        };
        match step {
            Ok(Some(openness)) => Ok(vec![face_with_openness(openness)]),
            Ok(None) => Ok(Vec::new()),
            Err(msg) => Err(DetectorError::Failed(msg)),
        }
    }
}

/// Eyes shut between 100 ms and 166 ms of every camera run, open otherwise.
pub fn blink_at_100ms(t: Duration) -> Option<f32> {
    let ms = t.as_millis();
    Some(if (100..=166).contains(&ms) { SHUT } else { OPEN })
}

/// Camera that plays frames 33 ms apart (camera clock) from a background
/// thread, 2 ms apart in real time. Frames of the n-th run carry marker n.
pub struct FakeCamera {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub fail_start: bool,
    /// Accept the sink, then drop it without delivering a frame.
    pub hang_up: bool,
    running: Option<Arc<AtomicBool>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            fail_start: false,
            hang_up: false,
            running: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    pub fn hanging_up() -> Self {
        Self {
            hang_up: true,
            ..Self::new()
        }
    }
}

impl CameraSession for FakeCamera {
    fn start(&mut self, sink: FrameSink) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::DeviceCaptureFailure(
                "front camera unavailable".to_string(),
            ));
        }
        let run = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang_up {
            drop(sink);
            return Ok(());
        }
        let running = Arc::new(AtomicBool::new(true));
        self.running = Some(Arc::clone(&running));

        std::thread::spawn(move || {
            for i in 0..500u64 {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                sink.push(frame(i * 33, run as u8));
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::SeqCst);
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
pub struct FakePresenter {
    pub no_surface: bool,
    pub decisions: VecDeque<PreviewDecision>,
    pub retries: VecDeque<bool>,
    pub reviewed: Arc<Mutex<Vec<u8>>>,
    pub retry_prompts: Arc<AtomicUsize>,
}

#[async_trait]
impl Presenter for FakePresenter {
    fn has_surface(&self) -> bool {
        !self.no_surface
    }

    async fn review_selfie(&mut self, still: &CapturedImage) -> PreviewDecision {
        self.reviewed.lock().unwrap().push(marker(still));
        self.decisions.pop_front().unwrap_or(PreviewDecision::Accept)
    }

    async fn offer_crop_retry(&mut self) -> bool {
        self.retry_prompts.fetch_add(1, Ordering::SeqCst);
        self.retries.pop_front().unwrap_or(false)
    }
}

pub struct FakeScanner {
    pub outcome: Option<Outcome<CapturedImage>>,
}

#[async_trait]
impl DocumentScanner for FakeScanner {
    async fn scan(&mut self) -> Outcome<CapturedImage> {
        self.outcome
            .take()
            .unwrap_or_else(|| Outcome::Failed("scanner already used".to_string()))
    }
}

#[derive(Default)]
pub struct FakeCropper {
    pub outcomes: VecDeque<Outcome<CapturedImage>>,
    /// Dimensions of every source image handed to the crop tool.
    pub sources: Arc<Mutex<Vec<(u32, u32)>>>,
}

#[async_trait]
impl CropTool for FakeCropper {
    async fn crop(&mut self, source: &CapturedImage) -> Outcome<CapturedImage> {
        self.sources
            .lock()
            .unwrap()
            .push((source.width(), source.height()));
        self.outcomes
            .pop_front()
            .unwrap_or(Outcome::Failed("crop script exhausted".to_string()))
    }
}

/// Bundle with a blinking camera and otherwise inert collaborators.
pub fn collaborators(
    presenter: FakePresenter,
    camera: FakeCamera,
    scanner: FakeScanner,
    cropper: FakeCropper,
) -> Collaborators {
    Collaborators::new(
        Box::new(presenter),
        Box::new(camera),
        Box::new(ScriptedDetector::by_timestamp(blink_at_100ms)),
        Box::new(scanner),
        Box::new(cropper),
    )
}
