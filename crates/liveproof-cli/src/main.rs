use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use liveproof_core::geometry::{bilateral_eye_ratio, mouth_ratio, nose_tip};
use liveproof_core::types::denormalize;
use liveproof_core::{verify_frames, LandmarkProvider, LivenessConfig, MeshLandmarkProvider, Point};
use liveproof_media::ClipBudget;
use liveproof_models::{ModelIntegrityError, DETECTOR_MODEL, MESH_MODEL, MODELS};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "liveproof", about = "liveproof liveness verification CLI")]
struct Cli {
    /// Directory holding the ONNX models (default: $LIVEPROOF_MODEL_DIR or
    /// $XDG_DATA_HOME/liveproof/models)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an animated clip (GIF, APNG or WebP) offline
    Check {
        /// Clip to verify
        clip: PathBuf,
        /// Analyse every n-th frame
        #[arg(long, default_value_t = 2)]
        stride: usize,
        /// Maximum frames to analyse
        #[arg(long, default_value_t = 600)]
        max_frames: usize,
        /// TOML file with a [liveness] table
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the biometric ratios liveproof sees in a single image
    Probe {
        /// Image to inspect
        image: PathBuf,
    },
    /// Verify the model directory
    Models,
}

#[derive(Serialize)]
struct ProbeReport {
    face: bool,
    width: u32,
    height: u32,
    landmarks: usize,
    eye_ratio: Option<f64>,
    mouth_ratio: Option<f64>,
    nose_tip: Option<Point>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let model_dir = cli
        .model_dir
        .or_else(|| std::env::var("LIVEPROOF_MODEL_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(liveproof_models::default_model_dir);

    match cli.command {
        Commands::Check {
            clip,
            stride,
            max_frames,
            config,
        } => check(&model_dir, &clip, stride, max_frames, config.as_deref()),
        Commands::Probe { image } => probe(&model_dir, &image),
        Commands::Models => Ok(if models(&model_dir) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }),
    }
}

fn load_provider(model_dir: &Path) -> Result<MeshLandmarkProvider> {
    liveproof_models::verify_models_dir(model_dir)
        .context("model verification failed; run `liveproof models` for details")?;
    let detector = model_dir.join(DETECTOR_MODEL);
    let mesh = model_dir.join(MESH_MODEL);
    let provider = MeshLandmarkProvider::load(&detector.to_string_lossy(), &mesh.to_string_lossy())?;
    Ok(provider)
}

fn load_liveness(path: Option<&Path>) -> Result<LivenessConfig> {
    let Some(path) = path else {
        return Ok(LivenessConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let liveness = LivenessConfig::from_toml_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    liveness.validate()?;
    Ok(liveness)
}

fn check(
    model_dir: &Path,
    clip: &Path,
    stride: usize,
    max_frames: usize,
    config: Option<&Path>,
) -> Result<ExitCode> {
    let liveness = load_liveness(config)?;
    let bytes =
        std::fs::read(clip).with_context(|| format!("failed to read {}", clip.display()))?;
    let (format, frames) =
        liveproof_media::decode_clip(&bytes, stride, max_frames, ClipBudget::default())
            .with_context(|| format!("cannot use {} as a clip", clip.display()))?;
    tracing::info!(format = format.as_str(), frames = frames.len(), "clip decoded");

    let mut provider = load_provider(model_dir)?;
    let report = verify_frames(&liveness, &mut provider, &frames)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn probe(model_dir: &Path, image: &Path) -> Result<ExitCode> {
    let bytes =
        std::fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;
    let frame = liveproof_media::decode_still(&bytes)?;
    let (width, height) = frame.dimensions();

    let mut provider = load_provider(model_dir)?;
    let report = match provider.detect(&frame)? {
        Some(landmarks) => {
            let points = denormalize(&landmarks, width, height);
            ProbeReport {
                face: true,
                width,
                height,
                landmarks: points.len(),
                eye_ratio: bilateral_eye_ratio(&points),
                mouth_ratio: mouth_ratio(&points),
                nose_tip: nose_tip(&points),
            }
        }
        None => ProbeReport {
            face: false,
            width,
            height,
            landmarks: 0,
            eye_ratio: None,
            mouth_ratio: None,
            nose_tip: None,
        },
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

/// Prints one status line per model; returns whether all passed.
fn models(model_dir: &Path) -> bool {
    println!("Model directory: {}", model_dir.display());
    let mut failed = false;

    for model in MODELS {
        let path = model_dir.join(model.name);
        let status = match liveproof_models::verify_file_sha256(model.name, &path, model.sha256) {
            Ok(()) if model.sha256.is_some() => "ok (checksum verified)".to_string(),
            Ok(()) => "ok (present, no pinned checksum)".to_string(),
            Err(ModelIntegrityError::MissingModel { .. }) => {
                failed = true;
                "MISSING".to_string()
            }
            Err(e) => {
                failed = true;
                format!("FAILED: {e}")
            }
        };
        println!("  {:<22} {:>8}  {status}", model.name, model.size_display);
        if status == "MISSING" {
            println!("    source: {}", model.source);
        }
    }

    !failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_args() {
        let cli = Cli::parse_from(["liveproof", "check", "clip.gif", "--stride", "3"]);
        match cli.command {
            Commands::Check {
                clip,
                stride,
                max_frames,
                config,
            } => {
                assert_eq!(clip, PathBuf::from("clip.gif"));
                assert_eq!(stride, 3);
                assert_eq!(max_frames, 600);
                assert!(config.is_none());
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_global_model_dir() {
        let cli = Cli::parse_from(["liveproof", "models", "--model-dir", "/srv/models"]);
        assert_eq!(cli.model_dir, Some(PathBuf::from("/srv/models")));
        assert!(matches!(cli.command, Commands::Models));
    }

    #[test]
    fn test_default_liveness_without_file() {
        assert_eq!(load_liveness(None).unwrap(), LivenessConfig::default());
    }

    #[test]
    fn test_liveness_file_validated() {
        let path = std::env::temp_dir().join(format!("liveproof-cli-{}.toml", std::process::id()));
        std::fs::write(&path, "[liveness]\nmouth_frames_required = 0\n").unwrap();
        let result = load_liveness(Some(&path));
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_models_reports_missing_dir() {
        let dir = std::env::temp_dir().join("liveproof-cli-test-no-models");
        assert!(!models(&dir));
    }
}
