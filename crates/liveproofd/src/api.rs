use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use liveproof_media::MediaError;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};
use crate::{stream, upload};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(engine: EngineHandle, config: Config) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}

/// Request failures, rendered as `{"success": false, "detail": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    TooLarge(String),
    #[error("{0}")]
    UnsupportedMedia(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "success": false, "detail": self.to_string() }))).into_response()
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Empty | MediaError::Decode(_) => ApiError::BadRequest(e.to_string()),
            MediaError::TooLarge(_) => ApiError::TooLarge(e.to_string()),
            MediaError::UnknownFormat(_)
            | MediaError::UnsupportedContainer(_)
            | MediaError::NotAnimated(_) => ApiError::UnsupportedMedia(format!(
                "{e}; upload an animated GIF, APNG or WebP clip"
            )),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ChannelClosed => ApiError::Unavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws/liveness", get(liveness_ws))
        .route(
            "/api/liveness/video",
            post(upload::verify_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({ "message": "liveproof liveness verification service" }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        // The daemon refuses to start without both models.
        "models_loaded": true,
        "model_dir": state.config.model_dir.display().to_string(),
        "liveness": state.config.liveness,
        "session_timeout_secs": state.config.session_timeout_secs,
        "frame_stride": state.config.frame_stride,
    }))
}

async fn liveness_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let engine = state.engine.clone();
    let liveness = state.config.liveness.clone();
    let timeout = state.config.session_timeout();
    ws.on_upgrade(move |mut socket| async move {
        stream::run_stream(&mut socket, engine, liveness, timeout).await;
    })
}
