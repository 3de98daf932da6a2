//! Action detectors for the head, mouth and blink stages.
//!
//! Each detector owns one monotonically non-decreasing counter. Counters are
//! cumulative over the stage: frames without a face in between do not reset
//! or decay them. `observe` returns whether the stage's required count has
//! been reached.

use crate::geometry::distance;
use crate::types::Point;

/// Counts frames whose nose tip moved more than `threshold` pixels since the
/// previous observed frame.
#[derive(Debug, Clone)]
pub struct HeadMovement {
    threshold: f64,
    required: u32,
    previous_nose: Option<Point>,
    count: u32,
}

impl HeadMovement {
    pub fn new(threshold: f64, required: u32) -> Self {
        Self {
            threshold,
            required,
            previous_nose: None,
            count: 0,
        }
    }

    /// Set the reference position without evaluating movement.
    pub fn prime(&mut self, nose: Point) {
        self.previous_nose = Some(nose);
    }

    pub fn observe(&mut self, nose: Point) -> bool {
        if let Some(previous) = self.previous_nose {
            let moved = distance(nose, previous);
            if moved > self.threshold {
                self.count += 1;
                tracing::debug!(moved, count = self.count, "head movement");
            }
        }
        // Displacement is frame-to-frame, not from the starting position.
        self.previous_nose = Some(nose);
        self.is_complete()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn previous_nose(&self) -> Option<Point> {
        self.previous_nose
    }

    pub fn is_complete(&self) -> bool {
        self.count >= self.required
    }
}

/// Counts frames whose mouth ratio exceeds `baseline * multiplier`.
#[derive(Debug, Clone)]
pub struct MouthOpening {
    multiplier: f64,
    required: u32,
    count: u32,
}

impl MouthOpening {
    pub fn new(multiplier: f64, required: u32) -> Self {
        Self {
            multiplier,
            required,
            count: 0,
        }
    }

    pub fn observe(&mut self, mouth_ratio: f64, baseline: f64) -> bool {
        if mouth_ratio > baseline * self.multiplier {
            self.count += 1;
            tracing::debug!(mouth_ratio, count = self.count, "mouth open");
        }
        self.is_complete()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_complete(&self) -> bool {
        self.count >= self.required
    }
}

/// Counts eye closures below `baseline * multiplier`, once per closure.
#[derive(Debug, Clone)]
pub struct Blink {
    multiplier: f64,
    required: u32,
    count: u32,
    active_last_frame: bool,
}

impl Blink {
    pub fn new(multiplier: f64, required: u32) -> Self {
        Self {
            multiplier,
            required,
            count: 0,
            active_last_frame: false,
        }
    }

    pub fn observe(&mut self, eye_ratio: f64, baseline: f64) -> bool {
        let active = eye_ratio < baseline * self.multiplier;
        if active && !self.active_last_frame {
            self.count += 1;
            tracing::debug!(eye_ratio, count = self.count, "blink");
        }
        self.active_last_frame = active;
        self.is_complete()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether the previous evaluated frame had the eyes closed.
    pub fn is_active(&self) -> bool {
        self.active_last_frame
    }

    pub fn is_complete(&self) -> bool {
        self.count >= self.required
    }
}
