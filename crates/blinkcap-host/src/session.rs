//! Capture sessions: one per host request.
//!
//! A [`CaptureSession`] owns everything one request needs (mode, pending
//! first signature, result sink, generation token, cancellation token) and
//! is dropped when the request ends. All of its state transitions run on the
//! task that awaits [`CaptureSession::run`]; pixel work goes to the blocking
//! pool and comes back tagged with the generation it started under.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use blinkcap_core::{
    encode_jpeg_base64, Binarizer, CaptureError, CaptureMode, CapturedImage,
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collaborators::{CameraSession, Collaborators, Outcome, PreviewDecision};
use crate::config::Config;
use crate::engine::{FramePipeline, PipelineConfig};

/// What a session resolves with: a base64 selfie or a JSON signature payload.
pub type SessionResult = Result<String, CaptureError>;

/// JSON payload returned by the signature flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignaturePayload {
    Dual {
        document: String,
        signature1: String,
        signature2: String,
    },
    Single {
        document: String,
        signature: String,
    },
}

/// Per-session settings derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub pipeline: PipelineConfig,
    pub selfie_jpeg_quality: u8,
    pub scan_jpeg_quality: u8,
    pub scan_threshold: Option<f32>,
    pub binarizer: Binarizer,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            pipeline: config.pipeline_config(),
            selfie_jpeg_quality: config.selfie_jpeg_quality,
            scan_jpeg_quality: config.scan_jpeg_quality,
            scan_threshold: config.scan_threshold,
            binarizer: config.binarizer(),
        }
    }
}

/// Monotonic attempt counter shared by a session and its handle.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Start a new attempt; everything tagged with an older value is stale.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn ticket(&self) -> Ticket {
        Ticket {
            value: self.current(),
            source: self.clone(),
        }
    }
}

/// Generation snapshot taken when background work starts.
#[derive(Debug, Clone)]
pub struct Ticket {
    value: u64,
    source: Generation,
}

impl Ticket {
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_current(&self) -> bool {
        self.source.current() == self.value
    }
}

/// Single-use result slot.
///
/// Resolving twice is a logged no-op. Dropping it unresolved resolves the
/// receiver with [`CaptureError::SessionAborted`].
pub struct ResultSink {
    session: Uuid,
    tx: Option<oneshot::Sender<SessionResult>>,
}

impl ResultSink {
    pub fn new(session: Uuid) -> (Self, oneshot::Receiver<SessionResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                session,
                tx: Some(tx),
            },
            rx,
        )
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.is_none()
    }

    /// Deliver the result. Returns `false` if it was already delivered.
    pub fn resolve(&mut self, result: SessionResult) -> bool {
        match self.tx.take() {
            Some(tx) => {
                if tx.send(result).is_err() {
                    tracing::debug!(session = %self.session, "result receiver already gone");
                }
                true
            }
            None => {
                tracing::warn!(session = %self.session, "result sink already resolved, ignoring");
                false
            }
        }
    }
}

impl Drop for ResultSink {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::warn!(session = %self.session, "session dropped without a result");
            let _ = tx.send(Err(CaptureError::SessionAborted));
        }
    }
}

/// Caller side of a session: cancel it or wait for its result.
pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    generation: Generation,
    result: oneshot::Receiver<SessionResult>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token the presentation layer fires when the user navigates away.
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.generation.advance();
        self.cancel.cancel();
    }

    pub async fn result(self) -> SessionResult {
        self.result.await.unwrap_or(Err(CaptureError::SessionAborted))
    }
}

pub struct CaptureSession {
    id: Uuid,
    mode: CaptureMode,
    config: SessionConfig,
    sink: ResultSink,
    generation: Generation,
    cancel: CancellationToken,
    first_signature: Option<CapturedImage>,
}

impl CaptureSession {
    pub fn new(mode: CaptureMode, config: SessionConfig) -> (Self, SessionHandle) {
        let id = Uuid::new_v4();
        let (sink, result) = ResultSink::new(id);
        let generation = Generation::default();
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            id,
            cancel: cancel.clone(),
            generation: generation.clone(),
            result,
        };
        let session = Self {
            id,
            mode,
            config,
            sink,
            generation,
            cancel,
            first_signature: None,
        };
        (session, handle)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Drive the session to completion and resolve its sink exactly once.
    pub async fn run(mut self, io: &mut Collaborators) {
        tracing::info!(session = %self.id, mode = ?self.mode, "capture session started");

        let result = if io.presenter.has_surface() {
            let cancel = self.cancel.clone();
            let generation = self.generation.clone();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    generation.advance();
                    Err(CaptureError::UserCancelled("capture dismissed".to_string()))
                }
                result = self.run_flow(io) => result,
            }
        } else {
            Err(CaptureError::NoActiveHostSurface)
        };

        if self.mode == CaptureMode::Selfie {
            io.camera.stop();
        }
        self.finish(result);
    }

    async fn run_flow(&mut self, io: &mut Collaborators) -> SessionResult {
        match self.mode {
            CaptureMode::Selfie => self.run_selfie(io).await,
            CaptureMode::SingleSignature | CaptureMode::DualSignature => {
                self.run_signatures(io).await
            }
        }
    }

    fn finish(&mut self, result: SessionResult) {
        match &result {
            Ok(payload) => tracing::info!(
                session = %self.id,
                mode = ?self.mode,
                bytes = payload.len(),
                "capture session completed"
            ),
            Err(e) => tracing::info!(
                session = %self.id,
                mode = ?self.mode,
                code = e.code(),
                error = %e,
                "capture session ended with error"
            ),
        }
        self.sink.resolve(result);
    }

    /// Stop the camera, rebuild the frame path, start the camera again.
    fn restart_camera(
        &self,
        pipeline: &mut FramePipeline,
        camera: &mut dyn CameraSession,
    ) -> Result<(), CaptureError> {
        camera.stop();
        pipeline.reset();
        camera.start(pipeline.sink())?;
        tracing::debug!(
            session = %self.id,
            generation = self.generation.current(),
            pipeline = pipeline.generation(),
            "camera live"
        );
        Ok(())
    }

    async fn run_selfie(&mut self, io: &mut Collaborators) -> SessionResult {
        let mut pipeline = FramePipeline::new(self.config.pipeline, Arc::clone(&io.detector));

        loop {
            self.restart_camera(&mut pipeline, io.camera.as_mut())?;
            let still = pipeline.await_still().await?;
            io.camera.stop();

            match io.presenter.review_selfie(&still).await {
                PreviewDecision::Accept => {
                    let quality = self.config.selfie_jpeg_quality;
                    return self
                        .background(move || Ok(encode_jpeg_base64(still.image(), quality)?))
                        .await;
                }
                PreviewDecision::Retake => {
                    let generation = self.generation.advance();
                    tracing::info!(session = %self.id, generation, "selfie retake");
                }
                PreviewDecision::Cancel => {
                    return Err(CaptureError::UserCancelled(
                        "selfie capture cancelled".to_string(),
                    ));
                }
            }
        }
    }

    async fn run_signatures(&mut self, io: &mut Collaborators) -> SessionResult {
        let scan = match io.scanner.scan().await {
            Outcome::Completed(scan) => scan,
            Outcome::Cancelled => {
                return Err(CaptureError::UserCancelled(
                    "document scan cancelled".to_string(),
                ))
            }
            Outcome::Failed(msg) => return Err(CaptureError::DeviceCaptureFailure(msg)),
        };
        tracing::info!(
            session = %self.id,
            width = scan.width(),
            height = scan.height(),
            "document scanned"
        );

        let needed = self.mode.signature_count();
        let mut stage = 1;
        let last = loop {
            // Every crop works on the original scan, never on an earlier crop.
            match io.cropper.crop(&scan).await {
                Outcome::Completed(crop) if stage < needed => {
                    tracing::debug!(session = %self.id, stage, "signature stored, next crop");
                    self.first_signature = Some(crop);
                    stage += 1;
                }
                Outcome::Completed(crop) => break crop,
                Outcome::Cancelled => {
                    tracing::info!(session = %self.id, stage, "crop cancelled");
                    if !io.presenter.offer_crop_retry().await {
                        return Err(CaptureError::UserCancelled(
                            "signature crop cancelled".to_string(),
                        ));
                    }
                }
                Outcome::Failed(msg) => return Err(CaptureError::DeviceCaptureFailure(msg)),
            }
        };

        let first = self.first_signature.take();
        let binarizer = self.config.binarizer;
        let threshold = self.config.scan_threshold;
        let quality = self.config.scan_jpeg_quality;

        let payload = self
            .background(move || {
                let encode = |img: &CapturedImage| -> Result<String, CaptureError> {
                    let bw = binarizer.apply(img.image(), threshold);
                    Ok(encode_jpeg_base64(&DynamicImage::ImageLuma8(bw), quality)?)
                };
                let document = encode(&scan)?;
                Ok(match first {
                    Some(first) => SignaturePayload::Dual {
                        document,
                        signature1: encode(&first)?,
                        signature2: encode(&last)?,
                    },
                    None => SignaturePayload::Single {
                        document,
                        signature: encode(&last)?,
                    },
                })
            })
            .await?;

        serde_json::to_string(&payload).map_err(|e| CaptureError::EncodingFailure(e.to_string()))
    }

    /// Run pixel work on the blocking pool.
    ///
    /// The result is only accepted if no retake or cancellation happened
    /// while it ran.
    async fn background<T, F>(&self, job: F) -> Result<T, CaptureError>
    where
        F: FnOnce() -> Result<T, CaptureError> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.generation.ticket();
        let output = tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| CaptureError::EncodingFailure(format!("background task failed: {e}")))??;

        if !ticket.is_current() {
            tracing::warn!(
                session = %self.id,
                generation = ticket.value(),
                current = self.generation.current(),
                "discarding result of superseded attempt"
            );
            return Err(CaptureError::SessionAborted);
        }
        Ok(output)
    }
}
