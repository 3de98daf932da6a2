#![allow(dead_code)]

use std::collections::VecDeque;

use image::RgbImage;
use liveproof_core::geometry::{LEFT_EYE, MOUTH, NOSE_TIP, RIGHT_EYE};
use liveproof_core::{LandmarkProvider, NormalizedLandmark, ProviderError};

/// Frame side in pixels. A power of two keeps `px / FRAME` exact in f32.
pub const FRAME: u32 = 1024;

const MESH_POINTS: usize = 468;
const EYE_WIDTH: i32 = 100;
const MOUTH_WIDTH: i32 = 100;

fn norm(x: i32, y: i32) -> NormalizedLandmark {
    NormalizedLandmark::new(x as f32 / FRAME as f32, y as f32 / FRAME as f32)
}

fn place_eye(points: &mut [NormalizedLandmark], indices: &[usize; 6], left: i32, gap: i32) {
    let top = 400;
    let coords = [
        (left, top),
        (left + 30, top),
        (left + 70, top),
        (left + EYE_WIDTH, top),
        (left + 70, top + gap),
        (left + 30, top + gap),
    ];
    for (&idx, (x, y)) in indices.iter().zip(coords) {
        points[idx] = norm(x, y);
    }
}

/// A 468-point face whose eye aspect ratio is `eye_gap / 100`, mouth aspect
/// ratio is `mouth_gap / 100`, with the nose tip at `nose`.
pub fn face(eye_gap: i32, mouth_gap: i32, nose: (i32, i32)) -> Vec<NormalizedLandmark> {
    let mut points = vec![norm(0, 0); MESH_POINTS];
    place_eye(&mut points, &LEFT_EYE, 300, eye_gap);
    place_eye(&mut points, &RIGHT_EYE, 600, eye_gap);

    let mouth = [
        (450, 700),
        (450 + MOUTH_WIDTH, 700),
        (480, 690),
        (480, 710),
        (500, 700),
        (500, 700 + mouth_gap),
    ];
    for (&idx, (x, y)) in MOUTH.iter().zip(mouth) {
        points[idx] = norm(x, y);
    }

    points[NOSE_TIP] = norm(nose.0, nose.1);
    points
}

/// Neutral face: eye ratio 0.30, mouth ratio 0.10, nose at the frame centre.
pub fn neutral() -> Vec<NormalizedLandmark> {
    face(30, 10, (512, 550))
}

/// A face whose eye and mouth corners coincide, so both ratios are undefined.
pub fn degenerate(nose: (i32, i32)) -> Vec<NormalizedLandmark> {
    let mut points = face(30, 10, nose);
    for indices in [&LEFT_EYE, &RIGHT_EYE] {
        points[indices[3]] = points[indices[0]];
    }
    points[MOUTH[1]] = points[MOUTH[0]];
    points
}

pub fn blank_frame() -> RgbImage {
    RgbImage::new(FRAME, FRAME)
}

/// Replays a fixed script of provider results, one per frame.
pub struct ScriptedProvider {
    script: VecDeque<Result<Option<Vec<NormalizedLandmark>>, String>>,
    pub calls: usize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self { script: VecDeque::new(), calls: 0 }
    }

    pub fn face(mut self, landmarks: Vec<NormalizedLandmark>) -> Self {
        self.script.push_back(Ok(Some(landmarks)));
        self
    }

    pub fn faces(mut self, n: usize, landmarks: Vec<NormalizedLandmark>) -> Self {
        for _ in 0..n {
            self.script.push_back(Ok(Some(landmarks.clone())));
        }
        self
    }

    pub fn no_face(mut self) -> Self {
        self.script.push_back(Ok(None));
        self
    }

    pub fn failure(mut self, reason: &str) -> Self {
        self.script.push_back(Err(reason.to_string()));
        self
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Option<Vec<NormalizedLandmark>>, ProviderError> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Ok(face)) => Ok(face),
            Some(Err(reason)) => Err(ProviderError::Other(reason)),
            None => Ok(None),
        }
    }
}
