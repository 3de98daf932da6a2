//! Liveness session state machine.
//!
//! Stages advance strictly in order:
//!
//! ```text
//! calibrating -> shake_head -> open_mouth -> blink -> done
//! ```
//!
//! Only the active stage is evaluated for a frame, so one frame completes at
//! most one transition. Frames without a face, or whose landmarks make a ratio
//! undefined, leave the session untouched.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::actions::{Blink, HeadMovement, MouthOpening};
use crate::calibration::{Baseline, Calibration};
use crate::config::{ConfigError, LivenessConfig};
use crate::geometry;
use crate::provider::{LandmarkProvider, ProviderError};
use crate::types::{denormalize, NormalizedLandmark, Point};

/// Verification stage. Ordered: a session's stage never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Calibrating,
    ShakeHead,
    OpenMouth,
    Blink,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Calibrating => "calibrating",
            Stage::ShakeHead => "shake_head",
            Stage::OpenMouth => "open_mouth",
            Stage::Blink => "blink",
            Stage::Done => "done",
        }
    }

    /// The stage that follows this one. `Done` is terminal.
    pub fn next(self) -> Stage {
        match self {
            Stage::Calibrating => Stage::ShakeHead,
            Stage::ShakeHead => Stage::OpenMouth,
            Stage::OpenMouth => Stage::Blink,
            Stage::Blink | Stage::Done => Stage::Done,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Stage::Done
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameOutcome {
    /// Stage after the frame was processed.
    pub stage: Stage,
    /// Whether this frame completed the stage that was active.
    pub action_completed: bool,
}

/// Point-in-time view of a session's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub stage: Stage,
    pub calibration_readings: usize,
    pub baseline: Baseline,
    pub head_movements: u32,
    pub mouth_opens: u32,
    pub blinks: u32,
}

/// One liveness verification attempt.
///
/// Calls to [`process_frame`](Self::process_frame) / [`observe`](Self::observe)
/// must be made sequentially, in frame order.
#[derive(Debug, Clone)]
pub struct LivenessSession {
    config: LivenessConfig,
    stage: Stage,
    calibration: Calibration,
    baseline: Baseline,
    head: HeadMovement,
    mouth: MouthOpening,
    blink: Blink,
}

impl LivenessSession {
    pub fn new(config: LivenessConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            stage: Stage::Calibrating,
            calibration: Calibration::new(config.calibration_frames),
            baseline: Baseline::default(),
            head: HeadMovement::new(config.head_movement_threshold, config.head_frames_required),
            mouth: MouthOpening::new(config.mouth_threshold, config.mouth_frames_required),
            blink: Blink::new(config.blink_threshold, config.blink_count_required),
            config,
        })
    }

    /// Run the landmark provider on `frame` and evaluate the active stage.
    ///
    /// A provider error leaves the session unchanged.
    pub fn process_frame<P>(
        &mut self,
        provider: &mut P,
        frame: &RgbImage,
    ) -> Result<FrameOutcome, ProviderError>
    where
        P: LandmarkProvider + ?Sized,
    {
        let face = provider.detect(frame)?;
        Ok(self.observe(face.as_deref(), frame.width(), frame.height()))
    }

    /// Evaluate provider output for one frame of the given size.
    ///
    /// `None` means no face was found; the frame is skipped.
    pub fn observe(
        &mut self,
        face: Option<&[NormalizedLandmark]>,
        width: u32,
        height: u32,
    ) -> FrameOutcome {
        match face {
            Some(landmarks) => self.observe_points(&denormalize(landmarks, width, height)),
            None => {
                tracing::trace!(stage = %self.stage, "no face; frame skipped");
                self.outcome(false)
            }
        }
    }

    /// Evaluate an already-denormalized landmark set.
    pub fn observe_points(&mut self, points: &[Point]) -> FrameOutcome {
        let completed = match self.stage {
            Stage::Calibrating => self.calibrate(points),
            Stage::ShakeHead => match geometry::nose_tip(points) {
                Some(nose) => self.head.observe(nose),
                None => self.skip_degenerate(),
            },
            Stage::OpenMouth => match geometry::mouth_ratio(points) {
                Some(ratio) => self.mouth.observe(ratio, self.baseline.mouth_ratio),
                None => self.skip_degenerate(),
            },
            Stage::Blink => match geometry::bilateral_eye_ratio(points) {
                Some(ratio) => self.blink.observe(ratio, self.baseline.eye_ratio),
                None => self.skip_degenerate(),
            },
            Stage::Done => false,
        };

        if completed {
            self.advance();
        }
        self.outcome(completed)
    }

    fn calibrate(&mut self, points: &[Point]) -> bool {
        let (Some(eye), Some(mouth), Some(nose)) = (
            geometry::bilateral_eye_ratio(points),
            geometry::mouth_ratio(points),
            geometry::nose_tip(points),
        ) else {
            return self.skip_degenerate();
        };

        // Head movement must have a reference the moment calibration ends.
        self.head.prime(nose);

        match self.calibration.record(eye, mouth) {
            Some(baseline) => {
                tracing::info!(
                    eye_ratio = baseline.eye_ratio,
                    mouth_ratio = baseline.mouth_ratio,
                    frames = self.calibration.readings(),
                    "calibration complete"
                );
                self.baseline = baseline;
                true
            }
            None => false,
        }
    }

    fn skip_degenerate(&self) -> bool {
        tracing::debug!(stage = %self.stage, "degenerate landmark geometry; frame skipped");
        false
    }

    fn advance(&mut self) {
        let from = self.stage;
        self.stage = from.next();
        tracing::info!(from = %from, to = %self.stage, "stage complete");
    }

    fn outcome(&self, action_completed: bool) -> FrameOutcome {
        FrameOutcome {
            stage: self.stage,
            action_completed,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_done(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Calibrated baseline; zero for both ratios until calibration completes.
    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn calibration_readings(&self) -> usize {
        self.calibration.readings()
    }

    pub fn previous_nose(&self) -> Option<Point> {
        self.head.previous_nose()
    }

    pub fn head_movements(&self) -> u32 {
        self.head.count()
    }

    pub fn mouth_opens(&self) -> u32 {
        self.mouth.count()
    }

    pub fn blinks(&self) -> u32 {
        self.blink.count()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            stage: self.stage,
            calibration_readings: self.calibration.readings(),
            baseline: self.baseline,
            head_movements: self.head.count(),
            mouth_opens: self.mouth.count(),
            blinks: self.blink.count(),
        }
    }
}
