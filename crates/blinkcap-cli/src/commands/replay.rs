//! `blinkcap replay`: feed a recorded landmark trace through the blink detector.
//!
//! The trace is JSON Lines, one frame per line:
//!
//! ```text
//! {"t": 0.033, "left": [[x, y], ...], "right": [[x, y], ...]}
//! ```
//!
//! Either eye may be missing, which is treated like a frame without a face.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use blinkcap_core::{BlinkConfig, BlinkDetector, EarFormula, EyePair, FaceLandmarks, Point2D};
use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON Lines trace file
    pub trace: PathBuf,

    /// Eye openness below which an eye counts as closed
    #[arg(long, default_value_t = blinkcap_core::blink::DEFAULT_CLOSED_THRESHOLD)]
    pub threshold: f32,

    /// Minimum spacing between accepted blinks
    #[arg(long, default_value_t = 1500)]
    pub cooldown_ms: u64,

    /// Eye aspect ratio formula: averaged or midpoint
    #[arg(long, default_value = "averaged")]
    pub formula: EarFormula,
}

#[derive(Debug, Deserialize)]
struct TraceSample {
    t: f64,
    #[serde(default)]
    left: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    right: Option<Vec<[f32; 2]>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReplayEvent {
    /// 1-based line of the frame that completed the blink.
    pub line: usize,
    pub t: f64,
    pub left: f32,
    pub right: f32,
}

fn eye(points: Option<Vec<[f32; 2]>>) -> Option<Vec<Point2D>> {
    points.map(|pts| pts.into_iter().map(|[x, y]| Point2D::new(x, y)).collect())
}

/// Replay every sample from `reader` and return the accepted blinks.
pub fn replay<R: BufRead>(reader: R, config: BlinkConfig) -> Result<Vec<ReplayEvent>> {
    let mut detector = BlinkDetector::new(config);
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: TraceSample = serde_json::from_str(&line)
            .with_context(|| format!("invalid trace sample on line {line_no}"))?;

        let face = FaceLandmarks {
            left_eye: eye(sample.left),
            right_eye: eye(sample.right),
            ..Default::default()
        };
        let openness = match EyePair::from_face(&face) {
            Ok(pair) => pair.map(|p| p.openness(config.formula)),
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "sample skipped");
                None
            }
        };

        let timestamp = Duration::try_from_secs_f64(sample.t.max(0.0))
            .with_context(|| format!("invalid timestamp on line {line_no}"))?;
        if detector.update(openness, timestamp).is_some() {
            if let Some((left, right)) = openness {
                events.push(ReplayEvent {
                    line: line_no,
                    t: sample.t,
                    left,
                    right,
                });
            }
        }
    }

    Ok(events)
}

pub fn run(args: &ReplayArgs) -> Result<()> {
    let file = std::fs::File::open(&args.trace)
        .with_context(|| format!("failed to open trace {}", args.trace.display()))?;
    let config = BlinkConfig {
        closed_threshold: args.threshold,
        cooldown: Duration::from_millis(args.cooldown_ms),
        formula: args.formula,
    };

    let events = replay(BufReader::new(file), config)?;
    tracing::info!(blinks = events.len(), trace = %args.trace.display(), "replay finished");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in &events {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    }
    Ok(())
}
