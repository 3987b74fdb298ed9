//! Adaptive binarization for scanned documents and signature crops.
//!
//! A single global threshold is chosen from the luma statistics of the whole
//! image, then every pixel is mapped to pure black or pure white.
//!
//! | condition          | threshold | typical input                      |
//! |--------------------|-----------|------------------------------------|
//! | std-dev > 30       | -0.01     | photo of a page on a busy backdrop |
//! | mean > 180         | 0.6       | bright paper scan                  |
//! | mean < 100         | 0.3       | dim lighting                       |
//! | otherwise          | 0.5       |                                    |
//!
//! The high-variance case is checked first. Its negative threshold sits below
//! every luma value, so such an image comes out all white. The output is
//! always two-level.

use image::{DynamicImage, GrayImage, Luma, Rgb};
use serde::Serialize;

/// Returned for high-variance images. Lower than any luma, so every pixel is white.
pub const SKIP_THRESHOLD: f32 = -0.01;
pub const BRIGHT_THRESHOLD: f32 = 0.6;
pub const DARK_THRESHOLD: f32 = 0.3;
pub const DEFAULT_THRESHOLD: f32 = 0.5;

const HIGH_STD_DEV: f32 = 30.0;
const BRIGHT_MEAN: f32 = 180.0;
const DARK_MEAN: f32 = 100.0;

/// Mean and population standard deviation of 8-bit luma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LumaStats {
    pub mean: f32,
    pub std_dev: f32,
}

/// ITU-R BT.601 luma on [0, 1].
fn luma(px: &Rgb<u8>) -> f32 {
    let [r, g, b] = px.0;
    (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)) / 255.0
}

fn luma_image(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (dst, src) in gray.pixels_mut().zip(rgb.pixels()) {
        *dst = Luma([(luma(src) * 255.0).round().clamp(0.0, 255.0) as u8]);
    }
    gray
}

/// Compute luma statistics over every pixel. An empty image reports zeros.
pub fn luma_stats(image: &DynamicImage) -> LumaStats {
    let gray = luma_image(image);
    let count = gray.width() as usize * gray.height() as usize;
    if count == 0 {
        return LumaStats {
            mean: 0.0,
            std_dev: 0.0,
        };
    }

    let sum: u64 = gray.pixels().map(|p| u64::from(p.0[0])).sum();
    let mean = sum as f64 / count as f64;
    let variance = gray
        .pixels()
        .map(|p| {
            let d = f64::from(p.0[0]) - mean;
            d * d
        })
        .sum::<f64>()
        / count as f64;

    LumaStats {
        mean: mean as f32,
        std_dev: variance.sqrt() as f32,
    }
}

/// Pick a threshold from image statistics.
pub fn auto_threshold(stats: LumaStats) -> f32 {
    if stats.std_dev > HIGH_STD_DEV {
        SKIP_THRESHOLD
    } else if stats.mean > BRIGHT_MEAN {
        BRIGHT_THRESHOLD
    } else if stats.mean < DARK_MEAN {
        DARK_THRESHOLD
    } else {
        DEFAULT_THRESHOLD
    }
}

/// Binarizer with an optional contrast gain applied before thresholding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binarizer {
    contrast: f32,
}

impl Default for Binarizer {
    fn default() -> Self {
        Self { contrast: 1.0 }
    }
}

impl Binarizer {
    /// Stretch luma around 0.5 by `gain` before comparing to the threshold.
    /// Gains of 1.0 or more leave pure black and white unchanged.
    pub fn with_contrast(gain: f32) -> Self {
        Self { contrast: gain }
    }

    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    /// Binarize with `threshold`, or one chosen by [`auto_threshold`].
    pub fn apply(&self, image: &DynamicImage, threshold: Option<f32>) -> GrayImage {
        let threshold = threshold.unwrap_or_else(|| auto_threshold(luma_stats(image)));

        let rgb = image.to_rgb8();
        let mut out = GrayImage::new(rgb.width(), rgb.height());
        for (dst, src) in out.pixels_mut().zip(rgb.pixels()) {
            let l = ((luma(src) - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0);
            *dst = Luma([if l < threshold { 0 } else { 255 }]);
        }

        tracing::debug!(
            threshold,
            contrast = self.contrast,
            width = out.width(),
            height = out.height(),
            "binarize: done"
        );
        out
    }
}

/// Binarize without contrast adjustment.
pub fn binarize(image: &DynamicImage, threshold: Option<f32>) -> GrayImage {
    Binarizer::default().apply(image, threshold)
}
