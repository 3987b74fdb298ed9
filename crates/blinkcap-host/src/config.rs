use std::time::Duration;

use blinkcap_core::{Binarizer, BlinkConfig, EarFormula};

use crate::engine::PipelineConfig;

/// Capture configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Eye openness below which an eye counts as closed.
    pub eye_closed_threshold: f32,
    /// Minimum spacing between two accepted blinks, in milliseconds.
    pub blink_cooldown_ms: u64,
    /// Eye aspect ratio formula used for every frame of a session.
    pub ear_formula: EarFormula,
    /// Wall-clock pause between the blink and freezing the still.
    pub settle_delay_ms: u64,
    /// JPEG quality of the accepted selfie.
    pub selfie_jpeg_quality: u8,
    /// JPEG quality of the binarized document and signatures.
    pub scan_jpeg_quality: u8,
    /// Fixed binarization threshold. `None` picks one per image from its statistics.
    pub scan_threshold: Option<f32>,
    /// Contrast gain applied to luma before thresholding.
    pub scan_contrast: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eye_closed_threshold: blinkcap_core::blink::DEFAULT_CLOSED_THRESHOLD,
            blink_cooldown_ms: 1500,
            ear_formula: EarFormula::Averaged,
            settle_delay_ms: 500,
            selfie_jpeg_quality: 80,
            scan_jpeg_quality: 100,
            scan_threshold: None,
            scan_contrast: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from `BLINKCAP_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ear_formula = match std::env::var("BLINKCAP_EAR_FORMULA") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "BLINKCAP_EAR_FORMULA ignored");
                defaults.ear_formula
            }),
            Err(_) => defaults.ear_formula,
        };

        Self {
            eye_closed_threshold: env_f32(
                "BLINKCAP_EYE_CLOSED_THRESHOLD",
                defaults.eye_closed_threshold,
            ),
            blink_cooldown_ms: env_u64("BLINKCAP_BLINK_COOLDOWN_MS", defaults.blink_cooldown_ms),
            ear_formula,
            settle_delay_ms: env_u64("BLINKCAP_SETTLE_DELAY_MS", defaults.settle_delay_ms),
            selfie_jpeg_quality: env_quality(
                "BLINKCAP_SELFIE_JPEG_QUALITY",
                defaults.selfie_jpeg_quality,
            ),
            scan_jpeg_quality: env_quality("BLINKCAP_SCAN_JPEG_QUALITY", defaults.scan_jpeg_quality),
            scan_threshold: std::env::var("BLINKCAP_SCAN_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok()),
            scan_contrast: env_f32("BLINKCAP_SCAN_CONTRAST", defaults.scan_contrast),
        }
    }

    pub fn blink_config(&self) -> BlinkConfig {
        BlinkConfig {
            closed_threshold: self.eye_closed_threshold,
            cooldown: Duration::from_millis(self.blink_cooldown_ms),
            formula: self.ear_formula,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            blink: self.blink_config(),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    pub fn binarizer(&self) -> Binarizer {
        Binarizer::with_contrast(self.scan_contrast)
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_quality(key: &str, default: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|q| (1..=100).contains(q))
        .unwrap_or(default)
}
