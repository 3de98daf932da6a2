//! liveproof-media — turns uploaded bytes into RGB frames.
//!
//! Stills arrive base64-encoded over the streaming socket; clips arrive as
//! animated GIF, APNG or animated WebP uploads.

pub mod clip;
pub mod frame;

pub use clip::{decode_clip, ClipBudget, ClipFormat};
pub use frame::{decode_still, MediaError};
