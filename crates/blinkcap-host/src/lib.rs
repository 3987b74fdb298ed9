//! blinkcap-host: capture sessions for a host application.
//!
//! A [`MethodChannel`] receives `captureSelfie`, `captureSingleSignature`
//! and `captureDualSignature` calls, runs one [`CaptureSession`] at a time
//! against the platform [`Collaborators`], and answers with a base64 JPEG or
//! a JSON payload of binarized scans.

pub mod channel;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod session;

#[cfg(test)]
mod testing;

pub use channel::{MethodChannel, MethodResponse};
pub use collaborators::{
    CameraSession, Collaborators, CropTool, DetectorError, DocumentScanner, FaceDetector, Outcome,
    PreviewDecision, Presenter,
};
pub use config::Config;
pub use engine::{FramePipeline, FrameSink, PipelineConfig};
pub use session::{CaptureSession, SessionConfig, SessionHandle, SignaturePayload};
