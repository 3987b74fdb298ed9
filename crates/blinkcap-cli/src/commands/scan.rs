//! `blinkcap binarize` and `blinkcap stats`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blinkcap_core::{auto_threshold, luma_stats, Binarizer, LumaStats};
use clap::Args;
use image::DynamicImage;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct BinarizeArgs {
    /// Scanned image to clean up
    pub input: PathBuf,

    /// Where to write the black-and-white result (format from extension)
    pub output: PathBuf,

    /// Fixed threshold in [0, 1]; negative turns every pixel white.
    /// Picked from the image statistics when omitted.
    #[arg(long, allow_hyphen_values = true)]
    pub threshold: Option<f32>,

    /// Contrast gain applied to luma before thresholding
    #[arg(long, default_value_t = 1.0)]
    pub contrast: f32,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Image to inspect
    pub input: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub stats: LumaStats,
    pub auto_threshold: f32,
}

impl StatsReport {
    pub fn of(image: &DynamicImage) -> Self {
        let stats = luma_stats(image);
        Self {
            width: image.width(),
            height: image.height(),
            stats,
            auto_threshold: auto_threshold(stats),
        }
    }
}

fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to read image {}", path.display()))
}

pub fn binarize(args: &BinarizeArgs) -> Result<()> {
    let source = open(&args.input)?;
    let binarizer = Binarizer::with_contrast(args.contrast);
    let out = binarizer.apply(&source, args.threshold);

    out.save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        threshold = ?args.threshold,
        contrast = args.contrast,
        "binarized"
    );
    Ok(())
}

pub fn stats(args: &StatsArgs) -> Result<()> {
    let source = open(&args.input)?;
    let report = StatsReport::of(&source);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
