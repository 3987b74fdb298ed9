//! blinkcap-core: perception primitives for liveness-gated selfie capture
//! and signature scan cleanup.
//!
//! Everything here is synchronous and free of I/O so it can run on any lane:
//! eye geometry and the blink state machine on the coordination lane, frame
//! freezing, binarization and encoding on the blocking pool.

pub mod binarize;
pub mod blink;
pub mod codec;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod types;

pub use binarize::{auto_threshold, binarize, luma_stats, Binarizer, LumaStats};
pub use blink::{BlinkConfig, BlinkDetector, BlinkEvent, BlinkState};
pub use codec::{encode_jpeg, encode_jpeg_base64, CodecError};
pub use error::CaptureError;
pub use frame::{CapturedImage, FrameError, Orientation, PixelFormat, RawFrame, Rotation};
pub use geometry::{eye_openness, EarFormula, EyePair};
pub use types::{BoundingBox, CaptureMode, EyeLandmarks, FaceLandmarks, LandmarkError, Point2D};
