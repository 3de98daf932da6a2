//! Face landmark providers.

use image::RgbImage;
use thiserror::Error;

use crate::detector::{DetectorError, FaceDetector};
use crate::mesh::{FaceMesh, MeshError};
use crate::types::NormalizedLandmark;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("face detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("face mesh: {0}")]
    Mesh(#[from] MeshError),
    #[error("landmark provider failed: {0}")]
    Other(String),
}

/// Produces the facial landmark set for a single frame.
///
/// Returns `Ok(None)` when no face is present. Landmarks are normalised to
/// the frame's width and height and follow the 468-point face-mesh index
/// convention (see [`crate::geometry`]).
pub trait LandmarkProvider {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Vec<NormalizedLandmark>>, ProviderError>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Vec<NormalizedLandmark>>, ProviderError> {
        (**self).detect(frame)
    }
}

/// SCRFD face detection followed by face-mesh landmark regression on the most
/// confident face.
pub struct MeshLandmarkProvider {
    detector: FaceDetector,
    mesh: FaceMesh,
}

impl MeshLandmarkProvider {
    pub fn load(scrfd_path: &str, mesh_path: &str) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let mesh = FaceMesh::load(mesh_path)?;
        Ok(Self { detector, mesh })
    }
}

impl LandmarkProvider for MeshLandmarkProvider {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Vec<NormalizedLandmark>>, ProviderError> {
        let faces = self.detector.detect(frame)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };
        tracing::trace!(confidence = face.confidence, faces = faces.len(), "face located");
        Ok(self.mesh.landmarks(frame, face)?)
    }
}
