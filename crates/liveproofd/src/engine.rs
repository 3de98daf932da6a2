use image::RgbImage;
use liveproof_core::{
    verify_frames, BatchReport, ConfigError, LandmarkProvider, LivenessConfig, NormalizedLandmark,
    ProviderError,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("landmark provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("invalid liveness config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Landmarks for one frame, or `None` when no face was found.
pub type Landmarks = Option<Vec<NormalizedLandmark>>;

/// Messages sent from connection handlers to the engine thread.
enum EngineRequest {
    Analyze {
        frame: RgbImage,
        reply: oneshot::Sender<Result<Landmarks, EngineError>>,
    },
    VerifyClip {
        frames: Vec<RgbImage>,
        config: LivenessConfig,
        reply: oneshot::Sender<Result<BatchReport, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run the landmark provider on one streamed frame.
    pub async fn analyze(&self, frame: RgbImage) -> Result<Landmarks, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Verify a decoded clip with a fresh session on the engine thread.
    pub async fn verify_clip(
        &self,
        frames: Vec<RgbImage>,
        config: LivenessConfig,
    ) -> Result<BatchReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::VerifyClip {
                frames,
                config,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread that owns `provider`.
///
/// ONNX sessions are not shared between connections; every request is
/// served in arrival order from a queue of depth `queue`.
pub fn spawn_engine<P>(mut provider: P, queue: usize) -> Result<EngineHandle, EngineError>
where
    P: LandmarkProvider + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue.max(1));

    std::thread::Builder::new()
        .name("liveproof-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { frame, reply } => {
                        let result = provider.detect(&frame).map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::VerifyClip {
                        frames,
                        config,
                        reply,
                    } => {
                        tracing::debug!(frames = frames.len(), "verifying clip");
                        let result =
                            verify_frames(&config, &mut provider, &frames).map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}
