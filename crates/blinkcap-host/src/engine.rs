//! Frame pipeline: camera frames in, one frozen still out.
//!
//! The pipeline is split across two lanes. [`FrameSink`] lives on the camera
//! lane: it retains the newest frame, runs the landmark detector and forwards
//! a [`DetectedFrame`] over a channel. [`FramePipeline`] lives on the
//! coordination lane and is the only writer of blink and capture state.
//!
//! Each [`FramePipeline::reset`] starts a new generation with a fresh frame
//! slot and channel. Sinks from an older generation keep working as far as
//! the camera is concerned but their frames are dropped.
//!
//! The pipeline only keeps a weak handle on its detection channel once a sink
//! has been handed out, so a camera that drops every sink closes the channel
//! and ends [`FramePipeline::await_still`] with an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use blinkcap_core::{
    BlinkConfig, BlinkDetector, BlinkEvent, CaptureError, CapturedImage, EyePair, FaceLandmarks,
    RawFrame,
};
use tokio::sync::{mpsc, watch};

use crate::collaborators::SharedDetector;

type FrameSlot = Option<Arc<RawFrame>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub blink: BlinkConfig,
    /// Pause between the blink and freezing the still, so the still is not
    /// taken mid-blink.
    pub settle_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blink: BlinkConfig::default(),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Detection result for one frame, marshaled to the coordination lane.
#[derive(Debug, Clone)]
pub struct DetectedFrame {
    pub generation: u64,
    pub timestamp: Duration,
    /// First face candidate, if any.
    pub face: Option<FaceLandmarks>,
}

/// Camera-lane entry point handed to [`crate::collaborators::CameraSession::start`].
#[derive(Clone)]
pub struct FrameSink {
    generation: u64,
    live_generation: Arc<AtomicU64>,
    latest: Arc<watch::Sender<FrameSlot>>,
    detected: mpsc::UnboundedSender<DetectedFrame>,
    detector: SharedDetector,
}

impl FrameSink {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver one frame. Called from the camera's own thread.
    ///
    /// Detection failures are logged and the frame is skipped; a single bad
    /// frame never ends the session.
    pub fn push(&self, frame: RawFrame) {
        if self.live_generation.load(Ordering::Acquire) != self.generation {
            tracing::trace!(generation = self.generation, "frame from superseded sink dropped");
            return;
        }

        let frame = Arc::new(frame);
        self.latest.send_replace(Some(Arc::clone(&frame)));

        let faces = {
            let mut detector = match self.detector.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            detector.detect(&frame)
        };

        let face = match faces {
            Ok(faces) => faces.into_iter().next(),
            Err(e) => {
                tracing::warn!(error = %e, timestamp = ?frame.timestamp, "frame skipped");
                return;
            }
        };

        let detected = DetectedFrame {
            generation: self.generation,
            timestamp: frame.timestamp,
            face,
        };
        if self.detected.send(detected).is_err() {
            tracing::trace!("frame pipeline gone, detection dropped");
        }
    }
}

/// Coordination-lane half of the frame pipeline.
pub struct FramePipeline {
    config: PipelineConfig,
    blink: BlinkDetector,
    capture_pending: bool,
    detector: SharedDetector,
    live_generation: Arc<AtomicU64>,
    latest_tx: Arc<watch::Sender<FrameSlot>>,
    latest_rx: watch::Receiver<FrameSlot>,
    /// Held until the first sink of a generation is built.
    detected_tx: Option<mpsc::UnboundedSender<DetectedFrame>>,
    detected_weak: mpsc::WeakUnboundedSender<DetectedFrame>,
    detected_rx: mpsc::UnboundedReceiver<DetectedFrame>,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig, detector: SharedDetector) -> Self {
        let (latest_tx, latest_rx) = watch::channel(None);
        let (detected_tx, detected_rx) = mpsc::unbounded_channel();
        Self {
            config,
            blink: BlinkDetector::new(config.blink),
            capture_pending: false,
            detector,
            live_generation: Arc::new(AtomicU64::new(0)),
            latest_tx: Arc::new(latest_tx),
            latest_rx,
            detected_weak: detected_tx.downgrade(),
            detected_tx: Some(detected_tx),
            detected_rx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.live_generation.load(Ordering::Acquire)
    }

    pub fn capture_pending(&self) -> bool {
        self.capture_pending
    }

    /// Sink for the current generation.
    ///
    /// Once every sink of this generation is dropped the channel closes; a
    /// sink built after that delivers nothing.
    pub fn sink(&mut self) -> FrameSink {
        let detected = match self.detected_tx.take() {
            Some(tx) => tx,
            None => self.detected_weak.upgrade().unwrap_or_else(|| {
                tracing::debug!(generation = self.generation(), "detection channel closed");
                mpsc::unbounded_channel().0
            }),
        };
        FrameSink {
            generation: self.generation(),
            live_generation: Arc::clone(&self.live_generation),
            latest: Arc::clone(&self.latest_tx),
            detected,
            detector: Arc::clone(&self.detector),
        }
    }

    /// Discard every trace of the previous attempt.
    ///
    /// Outstanding sinks are invalidated, the retained frame and queued
    /// detections are dropped with their channels, and the blink detector
    /// forgets its cooldown so the first blink of the new attempt counts.
    pub fn reset(&mut self) {
        let generation = self.live_generation.fetch_add(1, Ordering::AcqRel) + 1;

        let (latest_tx, latest_rx) = watch::channel(None);
        let (detected_tx, detected_rx) = mpsc::unbounded_channel();
        self.latest_tx = Arc::new(latest_tx);
        self.latest_rx = latest_rx;
        self.detected_weak = detected_tx.downgrade();
        self.detected_tx = Some(detected_tx);
        self.detected_rx = detected_rx;

        self.blink.reset();
        self.capture_pending = false;

        tracing::debug!(generation, "frame pipeline reset");
    }

    /// Apply one frame's detection result.
    ///
    /// No face, or a face without two usable eyes, leaves all state as is.
    /// Returns the blink event that should trigger a capture; blinks while
    /// a capture is already pending are swallowed.
    pub fn on_frame(
        &mut self,
        timestamp: Duration,
        face: Option<&FaceLandmarks>,
    ) -> Option<BlinkEvent> {
        let face = face?;
        let eyes = match EyePair::from_face(face) {
            Ok(Some(eyes)) => eyes,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "insufficient eye landmarks, frame ignored");
                return None;
            }
        };

        let openness = eyes.openness(self.config.blink.formula);
        let event = self.blink.update(Some(openness), timestamp)?;

        if self.capture_pending {
            tracing::debug!(?timestamp, "blink ignored, capture already pending");
            return None;
        }
        self.capture_pending = true;
        tracing::info!(?timestamp, generation = self.generation(), "blink detected, capture pending");
        Some(event)
    }

    /// Run until a blink, wait the settle delay, and freeze the newest frame.
    ///
    /// The settle delay is wall-clock; if the camera delivers nothing more in
    /// the meantime the last frame seen is used.
    pub async fn await_still(&mut self) -> Result<CapturedImage, CaptureError> {
        loop {
            let Some(detected) = self.detected_rx.recv().await else {
                return Err(CaptureError::DeviceCaptureFailure(
                    "frame delivery stopped".to_string(),
                ));
            };
            if detected.generation != self.generation() {
                continue;
            }
            if self.on_frame(detected.timestamp, detected.face.as_ref()).is_none() {
                continue;
            }

            tokio::time::sleep(self.config.settle_delay).await;

            let Some(frame) = self.latest_rx.borrow().clone() else {
                return Err(CaptureError::DeviceCaptureFailure(
                    "no frame retained at capture time".to_string(),
                ));
            };
            let still = tokio::task::spawn_blocking(move || frame.freeze())
                .await
                .map_err(|e| CaptureError::DeviceCaptureFailure(format!("freeze task failed: {e}")))??;

            tracing::info!(
                width = still.width(),
                height = still.height(),
                generation = self.generation(),
                "still captured"
            );
            return Ok(still);
        }
    }
}
