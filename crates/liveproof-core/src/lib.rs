//! liveproof-core — Sequential liveness verification engine.
//!
//! A [`LivenessSession`] consumes camera frames one at a time, calibrates a
//! per-session eye/mouth baseline, then walks the user through head movement,
//! mouth opening and blink checks. Facial landmarks come from a
//! [`LandmarkProvider`]; the bundled [`MeshLandmarkProvider`] runs SCRFD face
//! detection followed by a 468-point face-mesh regressor via ONNX Runtime.

pub mod actions;
pub mod batch;
pub mod calibration;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod mesh;
pub mod provider;
mod resample;
pub mod session;
pub mod types;

pub use batch::{verify_frames, BatchReport};
pub use calibration::Baseline;
pub use config::{ConfigError, LivenessConfig};
pub use provider::{LandmarkProvider, MeshLandmarkProvider, ProviderError};
pub use session::{FrameOutcome, LivenessSession, SessionSummary, Stage};
pub use types::{BoundingBox, NormalizedLandmark, Point};
