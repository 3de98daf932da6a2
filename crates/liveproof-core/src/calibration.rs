//! Per-session baseline calibration.
//!
//! Raw aspect ratios vary with face shape, camera distance and lighting, so
//! action thresholds are expressed relative to the user's own neutral
//! expression. The accumulator collects a fixed number of readings and
//! produces the baseline exactly once.

use serde::{Deserialize, Serialize};

/// Neutral-expression eye and mouth aspect ratios for one session.
///
/// Both values are zero until calibration completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub eye_ratio: f64,
    pub mouth_ratio: f64,
}

/// Collects baseline readings until the configured count is reached.
#[derive(Debug, Clone)]
pub struct Calibration {
    target: usize,
    eye_readings: Vec<f64>,
    mouth_readings: Vec<f64>,
}

impl Calibration {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            eye_readings: Vec::with_capacity(target),
            mouth_readings: Vec::with_capacity(target),
        }
    }

    /// Record one frame's readings.
    ///
    /// Returns the baseline on the reading that brings the count up to the
    /// target. Readings offered after that, or to a zero-target accumulator,
    /// are ignored.
    pub fn record(&mut self, eye_ratio: f64, mouth_ratio: f64) -> Option<Baseline> {
        if self.target == 0 || self.is_complete() {
            return None;
        }
        self.eye_readings.push(eye_ratio);
        self.mouth_readings.push(mouth_ratio);

        if self.is_complete() {
            Some(Baseline {
                eye_ratio: mean(&self.eye_readings),
                mouth_ratio: mean(&self.mouth_readings),
            })
        } else {
            None
        }
    }

    /// Number of readings collected so far.
    pub fn readings(&self) -> usize {
        self.eye_readings.len()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_complete(&self) -> bool {
        self.target > 0 && self.eye_readings.len() >= self.target
    }
}

/// Summed in ascending order so the result does not depend on arrival order.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().sum::<f64>() / sorted.len() as f64
}
