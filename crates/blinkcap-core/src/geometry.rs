//! Eye-openness metrics from six-point eye landmarks.
//!
//! Two formulations of the eye aspect ratio are in common use: the averaged
//! two-segment EAR, and a single top/bottom midpoint difference. Both share
//! the horizontal span between the eye corners as the denominator. A session
//! should pick one and stick with it since their values are not identical.

use serde::{Deserialize, Serialize};

use crate::types::{EyeLandmarks, FaceLandmarks, LandmarkError};

/// Openness reported for a degenerate (zero-width) eye: treated as open.
pub const DEGENERATE_OPENNESS: f32 = 1.0;

/// Which vertical distance the eye aspect ratio uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarFormula {
    /// Mean of the two lid-to-lid segments, `(|y1-y4| + |y2-y5|) / 2`.
    #[default]
    Averaged,
    /// Distance between the upper-lid and lower-lid midpoints.
    Midpoint,
}

impl std::str::FromStr for EarFormula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "averaged" | "ear" => Ok(Self::Averaged),
            "midpoint" => Ok(Self::Midpoint),
            other => Err(format!("unknown EAR formula '{other}'")),
        }
    }
}

/// Compute the vertical/horizontal openness ratio of one eye.
///
/// Returns [`DEGENERATE_OPENNESS`] when both corners share an x coordinate,
/// so the result is never NaN or infinite for finite input.
pub fn eye_openness(eye: &EyeLandmarks, formula: EarFormula) -> f32 {
    let p = eye.points();

    let horizontal = (p[0].x - p[3].x).abs();
    if horizontal == 0.0 {
        return DEGENERATE_OPENNESS;
    }

    let vertical = match formula {
        EarFormula::Averaged => ((p[1].y - p[4].y).abs() + (p[2].y - p[5].y).abs()) / 2.0,
        EarFormula::Midpoint => {
            let top = (p[1].y + p[2].y) / 2.0;
            let bottom = (p[4].y + p[5].y) / 2.0;
            (top - bottom).abs()
        }
    };

    vertical / horizontal
}

/// Both eyes of one face, validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyePair {
    pub left: EyeLandmarks,
    pub right: EyeLandmarks,
}

impl EyePair {
    /// Extract both eyes from a face candidate.
    ///
    /// `Ok(None)` means the detector did not place one of the eyes at all;
    /// `Err` means it placed one with too few points.
    pub fn from_face(face: &FaceLandmarks) -> Result<Option<Self>, LandmarkError> {
        let (Some(left), Some(right)) = (&face.left_eye, &face.right_eye) else {
            return Ok(None);
        };
        Ok(Some(Self {
            left: EyeLandmarks::try_from(left.as_slice())?,
            right: EyeLandmarks::try_from(right.as_slice())?,
        }))
    }

    /// `(left, right)` openness.
    pub fn openness(&self, formula: EarFormula) -> (f32, f32) {
        (
            eye_openness(&self.left, formula),
            eye_openness(&self.right, formula),
        )
    }
}
