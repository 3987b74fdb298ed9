//! Blink detection over per-frame eye openness.
//!
//! A live subject closes and reopens their eyes; a photograph held in front
//! of the camera does not. The detector watches both eyes and reports one
//! [`BlinkEvent`] per completed close-then-open cycle, debounced by a
//! cooldown so a long blink or jittery landmarks cannot fire twice.
//!
//! The detector never reads a clock. Every sample carries the timestamp of
//! the frame it came from, so replaying the same samples always yields the
//! same events.
//!
//! # States
//!
//! - `Open` → `Closing` when either eye drops below the closed threshold.
//! - `Closing` → `Open` when both eyes are back above it. An event is emitted
//!   unless the previous event is younger than the cooldown.
//! - A missing sample (no face, no usable eyes) leaves the state untouched.

use std::time::Duration;

use crate::geometry::EarFormula;

/// Openness below which an eye counts as closed.
pub const DEFAULT_CLOSED_THRESHOLD: f32 = 0.18;

/// Minimum spacing between two emitted blink events.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkConfig {
    pub closed_threshold: f32,
    pub cooldown: Duration,
    /// Formula the caller uses to turn landmarks into openness.
    pub formula: EarFormula,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            closed_threshold: DEFAULT_CLOSED_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
            formula: EarFormula::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkState {
    Open,
    /// At least one eye went below threshold; waiting for both to reopen.
    Closing,
}

/// A completed close-then-open cycle outside the cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkEvent {
    /// Timestamp of the frame on which both eyes reopened.
    pub timestamp: Duration,
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    config: BlinkConfig,
    state: BlinkState,
    last_event: Option<Duration>,
}

impl BlinkDetector {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            state: BlinkState::Open,
            last_event: None,
        }
    }

    pub fn config(&self) -> &BlinkConfig {
        &self.config
    }

    pub fn state(&self) -> BlinkState {
        self.state
    }

    /// Feed one frame's `(left, right)` openness.
    ///
    /// `None` means the frame had no usable eye signal and is ignored.
    /// Returns at most one event.
    pub fn update(&mut self, sample: Option<(f32, f32)>, timestamp: Duration) -> Option<BlinkEvent> {
        let (left, right) = sample?;
        let threshold = self.config.closed_threshold;
        let left_closed = left < threshold;
        let right_closed = right < threshold;

        tracing::trace!(left, right, left_closed, right_closed, state = ?self.state, "blink sample");

        match self.state {
            BlinkState::Open => {
                if left_closed || right_closed {
                    self.state = BlinkState::Closing;
                    tracing::debug!(?timestamp, "blink: eyes closing");
                }
                None
            }
            BlinkState::Closing => {
                if left_closed || right_closed {
                    return None;
                }
                self.state = BlinkState::Open;

                if let Some(last) = self.last_event {
                    if timestamp.saturating_sub(last) < self.config.cooldown {
                        tracing::debug!(?timestamp, ?last, "blink: reopened within cooldown");
                        return None;
                    }
                }

                self.last_event = Some(timestamp);
                tracing::debug!(?timestamp, "blink: completed");
                Some(BlinkEvent { timestamp })
            }
        }
    }

    /// Return to `Open` and forget the cooldown.
    pub fn reset(&mut self) {
        self.state = BlinkState::Open;
        self.last_event = None;
    }
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(BlinkConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: f32 = 0.3;
    const SHUT: f32 = 0.05;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Run a sample sequence and return the indices that emitted events.
    fn event_indices(samples: &[(Option<(f32, f32)>, u64)]) -> Vec<usize> {
        let mut det = BlinkDetector::default();
        samples
            .iter()
            .enumerate()
            .filter_map(|(i, (s, t))| det.update(*s, ms(*t)).map(|_| i))
            .collect()
    }

    #[test]
    fn test_open_eyes_never_fire() {
        let mut det = BlinkDetector::default();
        for t in 0..100 {
            assert!(det.update(Some((OPEN, OPEN)), ms(t * 33)).is_none());
        }
        assert_eq!(det.state(), BlinkState::Open);
    }

    #[test]
    fn test_close_then_open_fires_once() {
        let mut det = BlinkDetector::default();
        assert!(det.update(Some((OPEN, OPEN)), ms(0)).is_none());
        assert!(det.update(Some((SHUT, SHUT)), ms(33)).is_none());
        assert_eq!(det.state(), BlinkState::Closing);
        assert!(det.update(Some((SHUT, SHUT)), ms(66)).is_none());
        let ev = det.update(Some((OPEN, OPEN)), ms(99)).unwrap();
        assert_eq!(ev.timestamp, ms(99));
        assert!(det.update(Some((OPEN, OPEN)), ms(132)).is_none());
    }

    #[test]
    fn test_one_eye_starts_blink_both_must_reopen() {
        let mut det = BlinkDetector::default();
        assert!(det.update(Some((SHUT, OPEN)), ms(0)).is_none());
        assert_eq!(det.state(), BlinkState::Closing);
        // Left reopened but right now closed: still closing
        assert!(det.update(Some((OPEN, SHUT)), ms(33)).is_none());
        assert_eq!(det.state(), BlinkState::Closing);
        assert!(det.update(Some((OPEN, OPEN)), ms(66)).is_some());
    }

    #[test]
    fn test_missing_sample_is_noop() {
        let mut det = BlinkDetector::default();
        assert!(det.update(None, ms(0)).is_none());
        assert_eq!(det.state(), BlinkState::Open);

        det.update(Some((SHUT, SHUT)), ms(33));
        assert!(det.update(None, ms(66)).is_none());
        assert_eq!(det.state(), BlinkState::Closing);
        assert!(det.update(Some((OPEN, OPEN)), ms(99)).is_some());
    }

    #[test]
    fn test_blink_within_cooldown_is_suppressed() {
        let mut det = BlinkDetector::default();
        det.update(Some((SHUT, SHUT)), ms(0));
        assert!(det.update(Some((OPEN, OPEN)), ms(100)).is_some());

        det.update(Some((SHUT, SHUT)), ms(500));
        assert!(det.update(Some((OPEN, OPEN)), ms(600)).is_none());
        // Suppressed blink still returns to Open
        assert_eq!(det.state(), BlinkState::Open);

        det.update(Some((SHUT, SHUT)), ms(1700));
        assert!(det.update(Some((OPEN, OPEN)), ms(1800)).is_some());
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let mut det = BlinkDetector::default();
        det.update(Some((SHUT, SHUT)), ms(0));
        assert!(det.update(Some((OPEN, OPEN)), ms(100)).is_some());
        det.update(Some((SHUT, SHUT)), ms(1000));
        assert!(det.update(Some((OPEN, OPEN)), ms(1600)).is_some());
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let mut det = BlinkDetector::default();
        det.update(Some((SHUT, SHUT)), ms(0));
        assert!(det.update(Some((OPEN, OPEN)), ms(100)).is_some());
        det.update(Some((SHUT, SHUT)), ms(200));

        det.reset();
        assert_eq!(det.state(), BlinkState::Open);

        det.update(Some((SHUT, SHUT)), ms(300));
        assert!(det.update(Some((OPEN, OPEN)), ms(400)).is_some());
    }

    #[test]
    fn test_deterministic_replay() {
        let samples: Vec<(Option<(f32, f32)>, u64)> = (0..300u64)
            .map(|i| {
                let t = i * 33;
                let sample = match i % 47 {
                    0 => None,
                    5..=7 => Some((SHUT, OPEN)),
                    8 => Some((SHUT, SHUT)),
                    _ => Some((OPEN, OPEN)),
                };
                (sample, t)
            })
            .collect();

        let first = event_indices(&samples);
        for _ in 0..5 {
            assert_eq!(event_indices(&samples), first);
        }
        assert!(!first.is_empty());
    }

    #[test]
    fn test_events_respect_cooldown_spacing() {
        // Blink every 10 frames at 33 ms: far faster than the cooldown allows.
        let mut det = BlinkDetector::default();
        let mut events = Vec::new();
        for i in 0..600u64 {
            let sample = if i % 10 < 2 { (SHUT, SHUT) } else { (OPEN, OPEN) };
            if let Some(ev) = det.update(Some(sample), ms(i * 33)) {
                events.push(ev.timestamp);
            }
        }
        assert!(events.len() > 1);
        for pair in events.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_COOLDOWN);
        }
    }

    #[test]
    fn test_custom_threshold() {
        let mut det = BlinkDetector::new(BlinkConfig {
            closed_threshold: 0.1,
            ..Default::default()
        });
        // 0.15 is closed under the default but open here
        assert!(det.update(Some((0.15, 0.15)), ms(0)).is_none());
        assert_eq!(det.state(), BlinkState::Open);
    }
}
