//! 468-point face-mesh landmark regressor via ONNX Runtime.
//!
//! Runs on a square crop centred on a detected face box, enlarged so the
//! whole head fits. The model emits 468 (x, y, z) points in crop pixels plus
//! a face-presence logit; points are mapped back to frame-normalised
//! coordinates.

use crate::resample::sample_bilinear;
use crate::types::{BoundingBox, NormalizedLandmark};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const MESH_INPUT_SIZE: usize = 192;
const MESH_LANDMARK_COUNT: usize = 468;
const MESH_VALUES_PER_LANDMARK: usize = 3;
/// Crop side relative to the larger face-box side.
const MESH_ROI_SCALE: f32 = 1.5;
const MESH_PRESENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Square crop region in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CropRegion {
    x0: f32,
    y0: f32,
    side: f32,
}

impl CropRegion {
    fn around(face: &BoundingBox) -> Self {
        let (cx, cy) = face.center();
        let side = face.width.max(face.height) * MESH_ROI_SCALE;
        Self {
            x0: cx - side / 2.0,
            y0: cy - side / 2.0,
            side,
        }
    }

    /// Crop-input pixel coordinate to frame pixel coordinate.
    fn to_frame(self, x: f32, y: f32) -> (f32, f32) {
        let scale = self.side / MESH_INPUT_SIZE as f32;
        (self.x0 + x * scale, self.y0 + y * scale)
    }
}

/// Face-mesh landmark model.
pub struct FaceMesh {
    session: Session,
    output_count: usize,
}

impl FaceMesh {
    pub fn load(model_path: &str) -> Result<Self, MeshError> {
        if !Path::new(model_path).exists() {
            return Err(MeshError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_count = session.outputs().len();
        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face mesh model"
        );

        Ok(Self {
            session,
            output_count,
        })
    }

    /// Regress landmarks for the face inside `face`.
    ///
    /// Returns `Ok(None)` when the model's presence score says the crop holds
    /// no face.
    pub fn landmarks(
        &mut self,
        frame: &RgbImage,
        face: &BoundingBox,
    ) -> Result<Option<Vec<NormalizedLandmark>>, MeshError> {
        let crop = CropRegion::around(face);
        if crop.side <= 0.0 || frame.width() == 0 || frame.height() == 0 {
            return Ok(None);
        }
        let input = preprocess(frame, crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut tensors: Vec<&[f32]> = Vec::with_capacity(self.output_count);
        for idx in 0..self.output_count {
            let (_, data) = outputs[idx].try_extract_tensor::<f32>().map_err(|e| {
                MeshError::InferenceFailed(format!("output {idx}: {e}"))
            })?;
            tensors.push(data);
        }

        let (landmark_idx, presence_idx) = discover_outputs(&tensors).ok_or_else(|| {
            MeshError::InferenceFailed(format!(
                "no output with {} values among {:?}",
                MESH_LANDMARK_COUNT * MESH_VALUES_PER_LANDMARK,
                tensors.iter().map(|t| t.len()).collect::<Vec<_>>()
            ))
        })?;

        if let Some(idx) = presence_idx {
            let presence = sigmoid(tensors[idx][0]);
            if presence < MESH_PRESENCE_THRESHOLD {
                tracing::trace!(presence, "face mesh: no face in crop");
                return Ok(None);
            }
        }

        Ok(Some(decode_landmarks(
            tensors[landmark_idx],
            crop,
            frame.width(),
            frame.height(),
        )))
    }
}

/// Resample the crop region to the model's input, values scaled to [0, 1].
/// Parts of the crop outside the frame are black.
fn preprocess(frame: &RgbImage, crop: CropRegion) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, MESH_INPUT_SIZE, MESH_INPUT_SIZE));
    let step = crop.side / MESH_INPUT_SIZE as f32;

    for y in 0..MESH_INPUT_SIZE {
        let src_y = crop.y0 + (y as f32 + 0.5) * step - 0.5;
        for x in 0..MESH_INPUT_SIZE {
            let src_x = crop.x0 + (x as f32 + 0.5) * step - 0.5;
            if let Some(rgb) = sample_bilinear(frame, src_x, src_y) {
                for (c, value) in rgb.iter().enumerate() {
                    tensor[[0, c, y, x]] = value / 255.0;
                }
            }
        }
    }

    tensor
}

/// Identify the landmark tensor (468 * 3 values) and the optional
/// single-value presence tensor.
fn discover_outputs(tensors: &[&[f32]]) -> Option<(usize, Option<usize>)> {
    let landmarks = tensors
        .iter()
        .position(|t| t.len() == MESH_LANDMARK_COUNT * MESH_VALUES_PER_LANDMARK)?;
    let presence = tensors.iter().position(|t| t.len() == 1);
    Some((landmarks, presence))
}

fn decode_landmarks(
    raw: &[f32],
    crop: CropRegion,
    width: u32,
    height: u32,
) -> Vec<NormalizedLandmark> {
    raw.chunks_exact(MESH_VALUES_PER_LANDMARK)
        .map(|point| {
            let (fx, fy) = crop.to_frame(point[0], point[1]);
            NormalizedLandmark::new(fx / width as f32, fy / height as f32)
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
