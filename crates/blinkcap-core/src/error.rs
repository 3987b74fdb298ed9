use thiserror::Error;

use crate::codec::CodecError;
use crate::frame::FrameError;
use crate::types::LandmarkError;

/// Session-level failure reported back to the host application.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("no active host surface to present capture UI")]
    NoActiveHostSurface,
    #[error("user cancelled: {0}")]
    UserCancelled(String),
    #[error("capture device failure: {0}")]
    DeviceCaptureFailure(String),
    #[error("encoding failure: {0}")]
    EncodingFailure(String),
    #[error("invalid landmark input: expected {expected} points, got {got}")]
    InvalidLandmarkInput { expected: usize, got: usize },
    #[error("a capture session is already in progress")]
    SessionBusy,
    #[error("capture session ended without a result")]
    SessionAborted,
}

impl CaptureError {
    /// Stable error code sent over the host bridge.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveHostSurface => "NO_NAV",
            Self::UserCancelled(_) => "USER_CANCELLED",
            Self::DeviceCaptureFailure(_) => "CAMERA_ERROR",
            Self::EncodingFailure(_) => "ENCODING_ERROR",
            Self::InvalidLandmarkInput { .. } => "INVALID_LANDMARKS",
            Self::SessionBusy => "BUSY",
            Self::SessionAborted => "SESSION_ABORTED",
        }
    }
}

impl From<LandmarkError> for CaptureError {
    fn from(err: LandmarkError) -> Self {
        match err {
            LandmarkError::TooFewPoints { expected, got } => {
                Self::InvalidLandmarkInput { expected, got }
            }
        }
    }
}

impl From<CodecError> for CaptureError {
    fn from(err: CodecError) -> Self {
        Self::EncodingFailure(err.to_string())
    }
}

impl From<FrameError> for CaptureError {
    fn from(err: FrameError) -> Self {
        Self::DeviceCaptureFailure(err.to_string())
    }
}
