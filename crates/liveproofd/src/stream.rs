//! Streaming liveness session over a WebSocket.
//!
//! One session per connection. Each inbound `{"frame": ...}` message carries a
//! base64 image (optionally as a data URL); each processed frame produces one
//! status message. The connection is closed after the session passes or the
//! idle limit expires.

use std::future::Future;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbImage;
use liveproof_core::{FrameOutcome, LivenessConfig, LivenessSession, Stage};
use liveproof_media::{decode_still, MediaError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;

use crate::engine::{EngineError, EngineHandle};

const PASSED_MESSAGE: &str = "Liveness check passed!";
const TIMED_OUT_MESSAGE: &str = "Liveness check timed out";

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 frame: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("undecodable image: {0}")]
    Image(#[from] MediaError),
}

/// Why a single inbound message could not be applied to the session.
#[derive(Error, Debug)]
enum FrameError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Progress {
        stage: Stage,
        action_completed: bool,
    },
    Rejected {
        stage: Stage,
        action_completed: bool,
        error: String,
    },
    Finished {
        stage: Stage,
        success: bool,
        message: String,
    },
}

impl OutboundMessage {
    fn progress(outcome: FrameOutcome) -> Self {
        OutboundMessage::Progress {
            stage: outcome.stage,
            action_completed: outcome.action_completed,
        }
    }

    fn rejected(stage: Stage, error: &FrameError) -> Self {
        OutboundMessage::Rejected {
            stage,
            action_completed: false,
            error: error.to_string(),
        }
    }

    fn passed() -> Self {
        OutboundMessage::Finished {
            stage: Stage::Done,
            success: true,
            message: PASSED_MESSAGE.to_string(),
        }
    }

    fn timed_out(stage: Stage) -> Self {
        OutboundMessage::Finished {
            stage,
            success: false,
            message: TIMED_OUT_MESSAGE.to_string(),
        }
    }
}

/// The peer went away while a message was being sent.
#[derive(Debug)]
pub(crate) struct PeerGone;

/// Text-message duplex the session runs over.
pub(crate) trait FrameChannel {
    /// Next text message, or `None` once the peer has closed or the
    /// transport failed. Non-text frames are skipped.
    fn recv(&mut self) -> impl Future<Output = Option<String>> + Send;
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), PeerGone>> + Send;
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

impl FrameChannel for WebSocket {
    async fn recv(&mut self) -> Option<String> {
        loop {
            match WebSocket::recv(self).await? {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) => return None,
                Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "websocket receive failed");
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), PeerGone> {
        WebSocket::send(self, Message::Text(text))
            .await
            .map_err(|_| PeerGone)
    }

    async fn close(&mut self) {
        let _ = WebSocket::send(self, Message::Close(None)).await;
    }
}

/// Decode a streamed frame: strip an optional `data:<mime>;base64,` prefix,
/// base64-decode, then decode the image.
pub fn decode_frame_payload(payload: &str) -> Result<RgbImage, PayloadError> {
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
        None => payload,
    };
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(decode_still(&bytes)?)
}

/// Drive one liveness session until it passes, times out, or the peer leaves.
pub(crate) async fn run_stream<C: FrameChannel>(
    channel: &mut C,
    engine: EngineHandle,
    config: LivenessConfig,
    timeout: Option<Duration>,
) {
    let session_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("liveness", session = %session_id);
    drive(channel, engine, config, timeout).instrument(span).await
}

async fn drive<C: FrameChannel>(
    channel: &mut C,
    engine: EngineHandle,
    config: LivenessConfig,
    timeout: Option<Duration>,
) {
    let mut session = match LivenessSession::new(config) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "refusing session with invalid config");
            channel.close().await;
            return;
        }
    };
    tracing::info!("session started");

    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

    loop {
        // The deadline covers waiting on the engine as well as the peer.
        let step = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, next_step(channel, &mut session, &engine))
                    .await
                {
                    Ok(step) => step,
                    Err(_) => {
                        tracing::info!(stage = %session.stage(), "session timed out");
                        let _ = send(channel, &OutboundMessage::timed_out(session.stage())).await;
                        channel.close().await;
                        return;
                    }
                }
            }
            None => next_step(channel, &mut session, &engine).await,
        };

        let Some(result) = step else {
            tracing::info!(stage = %session.stage(), "client disconnected");
            return;
        };

        let reply = match result {
            Ok(None) => continue,
            Ok(Some(_)) if session.is_done() => OutboundMessage::passed(),
            Ok(Some(outcome)) => OutboundMessage::progress(outcome),
            Err(e) => {
                tracing::debug!(error = %e, "frame rejected");
                OutboundMessage::rejected(session.stage(), &e)
            }
        };

        if send(channel, &reply).await.is_err() {
            tracing::info!(stage = %session.stage(), "client disconnected");
            return;
        }

        if session.is_done() {
            tracing::info!("liveness check passed");
            channel.close().await;
            return;
        }
    }
}

/// Wait for the next message and apply it. `None` once the peer has gone.
async fn next_step<C: FrameChannel>(
    channel: &mut C,
    session: &mut LivenessSession,
    engine: &EngineHandle,
) -> Option<Result<Option<FrameOutcome>, FrameError>> {
    let text = channel.recv().await?;
    Some(apply_message(session, engine, &text).await)
}

/// Returns `Ok(None)` for messages that carry no frame.
async fn apply_message(
    session: &mut LivenessSession,
    engine: &EngineHandle,
    text: &str,
) -> Result<Option<FrameOutcome>, FrameError> {
    let message: InboundMessage = serde_json::from_str(text).map_err(PayloadError::from)?;
    let Some(payload) = message.frame.filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    let frame = decode_frame_payload(&payload)?;
    let (width, height) = frame.dimensions();
    let landmarks = engine.analyze(frame).await?;
    Ok(Some(session.observe(landmarks.as_deref(), width, height)))
}

async fn send<C: FrameChannel>(channel: &mut C, message: &OutboundMessage) -> Result<(), PeerGone> {
    match serde_json::to_string(message) {
        Ok(text) => channel.send(text).await,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode status message");
            Ok(())
        }
    }
}
