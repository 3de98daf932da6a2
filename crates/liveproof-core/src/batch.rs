//! Whole-clip verification: drive one session over an ordered frame sequence.

use std::borrow::Borrow;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, LivenessConfig};
use crate::provider::LandmarkProvider;
use crate::session::{LivenessSession, Stage};

/// Final counters for a verified clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// The clip was processed; see `final_stage` for the verdict.
    pub success: bool,
    pub head_shakes: u32,
    pub mouth_opens: u32,
    pub blinks: u32,
    pub final_stage: Stage,
    /// Frames handed to the landmark provider.
    pub frames_analyzed: usize,
}

impl BatchReport {
    /// Whether the clip demonstrated the full action sequence.
    pub fn passed(&self) -> bool {
        self.final_stage == Stage::Done
    }
}

/// Run a fresh session over `frames` in order, stopping early at `done`.
///
/// Provider failures on individual frames are logged and the frame skipped.
pub fn verify_frames<P, I>(
    config: &LivenessConfig,
    provider: &mut P,
    frames: I,
) -> Result<BatchReport, ConfigError>
where
    P: LandmarkProvider + ?Sized,
    I: IntoIterator,
    I::Item: Borrow<RgbImage>,
{
    let mut session = LivenessSession::new(config.clone())?;
    let mut frames_analyzed = 0usize;

    for (index, frame) in frames.into_iter().enumerate() {
        frames_analyzed += 1;
        let frame: &RgbImage = frame.borrow();
        if let Err(e) = session.process_frame(&mut *provider, frame) {
            tracing::warn!(frame = index, error = %e, "landmark provider failed; frame skipped");
        }
        if session.is_done() {
            break;
        }
    }

    tracing::info!(
        frames = frames_analyzed,
        stage = %session.stage(),
        head = session.head_movements(),
        mouth = session.mouth_opens(),
        blinks = session.blinks(),
        "clip verified"
    );

    Ok(BatchReport {
        success: true,
        head_shakes: session.head_movements(),
        mouth_opens: session.mouth_opens(),
        blinks: session.blinks(),
        final_stage: session.stage(),
        frames_analyzed,
    })
}
