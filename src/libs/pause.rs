//! Randomized pauses between repeated activities.
//!
//! A pause is never a fixed interval: each cycle draws a fresh wait
//! uniformly from `[P * (1 - v), P * (1 + v)]`.

use chrono::TimeDelta;
use rand::Rng;

/// A base pause and its relative variation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PauseWindow {
    pub base: TimeDelta,
    /// Fraction in `0.0..1.0`; values outside are clamped.
    pub variation: f64,
}

impl PauseWindow {
    pub fn new(base: TimeDelta, variation: f64) -> Self {
        Self { base, variation }
    }

    pub fn from_minutes(minutes: f64, variation: f64) -> Self {
        let millis = (minutes.max(0.0) * 60_000.0).round() as i64;
        Self::new(TimeDelta::milliseconds(millis), variation)
    }

    /// Inclusive bounds of the window.
    pub fn bounds(&self) -> (TimeDelta, TimeDelta) {
        let v = self.variation.clamp(0.0, 1.0);
        let base = self.base.num_milliseconds() as f64;
        let low = (base * (1.0 - v)).round() as i64;
        let high = (base * (1.0 + v)).round() as i64;
        (TimeDelta::milliseconds(low.max(0)), TimeDelta::milliseconds(high.max(0)))
    }

    /// Draws one pause from the window.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TimeDelta {
        let (low, high) = self.bounds();
        let (low, high) = (low.num_milliseconds(), high.num_milliseconds());
        if low >= high {
            return TimeDelta::milliseconds(low);
        }
        TimeDelta::milliseconds(rng.gen_range(low..=high))
    }
}

/// Applies relative jitter to a tick interval.
pub fn jittered(interval: std::time::Duration, jitter: f64) -> std::time::Duration {
    let window = PauseWindow::new(TimeDelta::milliseconds(interval.as_millis() as i64), jitter);
    let pause = window.sample(&mut rand::thread_rng());
    std::time::Duration::from_millis(pause.num_milliseconds().max(0) as u64)
}
