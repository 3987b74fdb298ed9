use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of landmark points describing one eye.
pub const EYE_POINT_COUNT: usize = 6;

/// Normalized (0..1) coordinate inside a face bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point2D {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Normalized face bounding box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LandmarkError {
    #[error("eye landmarks need {expected} points, got {got}")]
    TooFewPoints { expected: usize, got: usize },
}

/// Six eye landmarks in anatomical order.
///
/// Index 0 is the outer corner and 3 the inner corner (horizontal extremes),
/// 1 and 2 lie on the upper lid, 4 and 5 on the lower lid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeLandmarks([Point2D; EYE_POINT_COUNT]);

impl EyeLandmarks {
    pub const fn new(points: [Point2D; EYE_POINT_COUNT]) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point2D; EYE_POINT_COUNT] {
        &self.0
    }
}

impl TryFrom<&[Point2D]> for EyeLandmarks {
    type Error = LandmarkError;

    /// Detectors may report more than six points per eye; only the leading
    /// six follow the anatomical order, so the rest are ignored.
    fn try_from(points: &[Point2D]) -> Result<Self, Self::Error> {
        let leading: [Point2D; EYE_POINT_COUNT] = points
            .get(..EYE_POINT_COUNT)
            .and_then(|s| s.try_into().ok())
            .ok_or(LandmarkError::TooFewPoints {
                expected: EYE_POINT_COUNT,
                got: points.len(),
            })?;
        Ok(Self(leading))
    }
}

/// One face candidate reported by the landmark detector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    /// Absent even with a face present when the detector could not place the eye.
    pub left_eye: Option<Vec<Point2D>>,
    pub right_eye: Option<Vec<Point2D>>,
}

/// Which capture flow a session runs. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Selfie,
    SingleSignature,
    DualSignature,
}

impl CaptureMode {
    /// Number of signature crops the flow collects from one scan.
    pub fn signature_count(self) -> usize {
        match self {
            Self::Selfie => 0,
            Self::SingleSignature => 1,
            Self::DualSignature => 2,
        }
    }
}
