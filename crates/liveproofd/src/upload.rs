//! Whole-clip verification over HTTP upload.

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use liveproof_core::BatchReport;
use liveproof_media::decode_clip;

use crate::api::{ApiError, AppState};

/// `POST /api/liveness/video`: the first file field of the multipart body is
/// the clip.
pub(crate) async fn verify_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchReport>, ApiError> {
    let clip = loop {
        let Some(field) = multipart.next_field().await.map_err(multipart_error)? else {
            return Err(ApiError::BadRequest("no video file in upload".into()));
        };
        if field.file_name().is_some() {
            break field.bytes().await.map_err(multipart_error)?;
        }
    };

    verify_clip_bytes(&state, clip).await.map(Json)
}

pub(crate) async fn verify_clip_bytes(
    state: &AppState,
    clip: Bytes,
) -> Result<BatchReport, ApiError> {
    let stride = state.config.frame_stride;
    let max_frames = state.config.max_clip_frames;
    let budget = state.config.clip_budget();
    let upload_len = clip.len();

    let (format, frames) =
        tokio::task::spawn_blocking(move || decode_clip(&clip, stride, max_frames, budget))
            .await
            .map_err(|e| ApiError::Internal(format!("clip decode task failed: {e}")))??;
    tracing::info!(
        format = format.as_str(),
        bytes = upload_len,
        frames = frames.len(),
        "clip received"
    );

    let report = state
        .engine
        .verify_clip(frames, state.config.liveness.clone())
        .await?;
    Ok(report)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::TooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::spawn_engine;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, DynamicImage, Frame, ImageFormat, RgbImage, Rgba, RgbaImage};
    use liveproof_core::{
        LandmarkProvider, LivenessConfig, NormalizedLandmark, ProviderError, Stage,
    };
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts frames and never finds a face.
    struct Counting(Arc<AtomicUsize>);

    impl LandmarkProvider for Counting {
        fn detect(
            &mut self,
            _frame: &RgbImage,
        ) -> Result<Option<Vec<NormalizedLandmark>>, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn state(stride: usize, max_clip_frames: usize) -> (AppState, Arc<AtomicUsize>) {
        with_config(|config| {
            config.frame_stride = stride;
            config.max_clip_frames = max_clip_frames;
        })
    }

    fn with_config(adjust: impl FnOnce(&mut Config)) -> (AppState, Arc<AtomicUsize>) {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut config = Config {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            model_dir: PathBuf::from("/models"),
            liveness: LivenessConfig::default(),
            session_timeout_secs: 0,
            frame_stride: 1,
            max_clip_frames: 100,
            max_clip_dimension: 4096,
            max_clip_bytes: 128 * 1024 * 1024,
            max_upload_bytes: 1024 * 1024,
            engine_queue: 2,
        };
        adjust(&mut config);
        let engine = spawn_engine(Counting(seen.clone()), 2).unwrap();
        (AppState::new(engine, config), seen)
    }

    fn gif(frames: usize) -> Bytes {
        sized_gif(frames, 8)
    }

    fn sized_gif(frames: usize, side: u32) -> Bytes {
        let mut buf = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buf);
            let frames = (0..frames).map(|i| {
                let level = (i * 20) as u8;
                Frame::from_parts(
                    RgbaImage::from_pixel(side, side, Rgba([level, level, level, 255])),
                    0,
                    0,
                    Delay::from_numer_denom_ms(33, 1),
                )
            });
            encoder.encode_frames(frames).unwrap();
        }
        Bytes::from(buf)
    }

    #[tokio::test]
    async fn test_clip_sampled_by_stride() {
        let (state, seen) = state(2, 100);
        let report = verify_clip_bytes(&state, gif(9)).await.unwrap();
        assert!(report.success);
        assert_eq!(report.final_stage, Stage::Calibrating);
        // Frames 0, 2, 4, 6, 8.
        assert_eq!(report.frames_analyzed, 5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_clip_capped() {
        let (state, _) = state(1, 3);
        let report = verify_clip_bytes(&state, gif(10)).await.unwrap();
        assert_eq!(report.frames_analyzed, 3);
    }

    #[tokio::test]
    async fn test_still_image_rejected_before_analysis() {
        let (state, seen) = state(1, 100);
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let err = verify_clip_bytes(&state, Bytes::from(png)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_garbage_rejected() {
        let (state, _) = state(1, 100);
        let err = verify_clip_bytes(&state, Bytes::from_static(b"%PDF-1.7 not a video"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_clip_over_decode_budget_rejected_before_analysis() {
        let (state, seen) = with_config(|config| config.max_clip_bytes = 512 * 512 * 3 * 4);
        let err = verify_clip_bytes(&state, sized_gif(12, 512)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clip_canvas_over_limit_rejected() {
        let (state, _) = with_config(|config| config.max_clip_dimension = 256);
        let err = verify_clip_bytes(&state, sized_gif(2, 512)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_empty_upload() {
        let (state, _) = state(1, 100);
        let err = verify_clip_bytes(&state, Bytes::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
