use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use liveproof_core::{ConfigError, LivenessConfig};
use liveproof_media::ClipBudget;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
    #[error("invalid LIVEPROOF_BIND_ADDR {value:?}: {reason}")]
    BindAddr { value: String, reason: String },
    #[error("invalid liveness settings: {0}")]
    Liveness(#[from] ConfigError),
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (default: 0.0.0.0:8000).
    pub bind_addr: SocketAddr,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Thresholds applied to every session this daemon hosts.
    pub liveness: LivenessConfig,
    /// Streaming sessions that have not finished within this many seconds
    /// are closed. Zero disables the limit.
    pub session_timeout_secs: u64,
    /// Keep every n-th decoded frame of an uploaded clip.
    pub frame_stride: usize,
    /// Upper bound on frames analysed per uploaded clip.
    pub max_clip_frames: usize,
    /// Uploaded clips with a wider or taller canvas are refused.
    pub max_clip_dimension: u32,
    /// Upper bound on decoded RGB bytes held for one uploaded clip.
    pub max_clip_bytes: u64,
    /// Request body limit for clip uploads.
    pub max_upload_bytes: usize,
    /// Pending requests the engine thread will queue before callers wait.
    pub engine_queue: usize,
}

impl Config {
    /// Load configuration from `LIVEPROOF_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, LoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoadError> {
        let bind_addr = match lookup("LIVEPROOF_BIND_ADDR") {
            Some(value) => value.parse::<SocketAddr>().map_err(|e| LoadError::BindAddr {
                reason: e.to_string(),
                value,
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8000)),
        };

        let model_dir = lookup("LIVEPROOF_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(liveproof_models::default_model_dir);

        let file_liveness = match lookup("LIVEPROOF_CONFIG") {
            Some(path) => load_file(Path::new(&path))?,
            None => LivenessConfig::default(),
        };

        let liveness = apply_liveness_env(file_liveness, &lookup);
        liveness.validate()?;

        Ok(Self {
            bind_addr,
            model_dir,
            liveness,
            session_timeout_secs: env_or(&lookup, "LIVEPROOF_SESSION_TIMEOUT_SECS", 120),
            frame_stride: env_or(&lookup, "LIVEPROOF_FRAME_STRIDE", 2usize).max(1),
            max_clip_frames: env_or(&lookup, "LIVEPROOF_MAX_CLIP_FRAMES", 600),
            max_clip_dimension: env_or(&lookup, "LIVEPROOF_MAX_CLIP_DIMENSION", 4096),
            max_clip_bytes: env_or(&lookup, "LIVEPROOF_MAX_CLIP_BYTES", 128 * 1024 * 1024),
            max_upload_bytes: env_or(&lookup, "LIVEPROOF_MAX_UPLOAD_BYTES", 50 * 1024 * 1024),
            engine_queue: env_or(&lookup, "LIVEPROOF_ENGINE_QUEUE", 16usize).max(1),
        })
    }

    /// Idle limit for a streaming session, if any.
    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session_timeout_secs > 0).then(|| Duration::from_secs(self.session_timeout_secs))
    }

    /// Decode limits applied to uploaded clips.
    pub fn clip_budget(&self) -> ClipBudget {
        ClipBudget {
            max_dimension: self.max_clip_dimension,
            max_total_bytes: self.max_clip_bytes,
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(liveproof_models::DETECTOR_MODEL)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face-mesh landmark model.
    pub fn mesh_model_path(&self) -> String {
        self.model_dir
            .join(liveproof_models::MESH_MODEL)
            .to_string_lossy()
            .into_owned()
    }
}

/// Liveness settings from the TOML file named by `LIVEPROOF_CONFIG`.
fn load_file(path: &Path) -> Result<LivenessConfig, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let liveness = LivenessConfig::from_toml_str(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(liveness)
}

fn apply_liveness_env(
    mut liveness: LivenessConfig,
    lookup: &impl Fn(&str) -> Option<String>,
) -> LivenessConfig {
    liveness.calibration_frames =
        env_or(lookup, "LIVEPROOF_CALIBRATION_FRAMES", liveness.calibration_frames);
    liveness.head_movement_threshold = env_or(
        lookup,
        "LIVEPROOF_HEAD_MOVEMENT_THRESHOLD",
        liveness.head_movement_threshold,
    );
    liveness.head_frames_required =
        env_or(lookup, "LIVEPROOF_HEAD_FRAMES_REQUIRED", liveness.head_frames_required);
    liveness.mouth_threshold = env_or(lookup, "LIVEPROOF_MOUTH_THRESHOLD", liveness.mouth_threshold);
    liveness.mouth_frames_required =
        env_or(lookup, "LIVEPROOF_MOUTH_FRAMES_REQUIRED", liveness.mouth_frames_required);
    liveness.blink_threshold = env_or(lookup, "LIVEPROOF_BLINK_THRESHOLD", liveness.blink_threshold);
    liveness.blink_count_required =
        env_or(lookup, "LIVEPROOF_BLINK_COUNT_REQUIRED", liveness.blink_count_required);
    liveness
}

fn env_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable setting; using default");
            default
        }),
        None => default,
    }
}
