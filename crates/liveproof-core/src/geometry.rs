//! Landmark geometry: distances and the eye/mouth aspect ratios.
//!
//! Indices follow the 468-point face-mesh convention. Every ratio helper
//! returns `None` when its horizontal denominator is zero or when the
//! landmark set is too short to contain the required points, so a degenerate
//! frame can never yield an infinite or NaN reading.

use crate::types::Point;

/// Nose tip.
pub const NOSE_TIP: usize = 1;
/// Left eye, ordered `[outer corner, upper, upper, inner corner, lower, lower]`.
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
/// Right eye, same ordering as [`LEFT_EYE`].
pub const RIGHT_EYE: [usize; 6] = [263, 387, 385, 362, 380, 373];
/// Mouth, ordered `[left corner, right corner, _, _, upper lip, lower lip]`.
pub const MOUTH: [usize; 6] = [61, 291, 81, 178, 13, 14];

/// Euclidean distance between two landmark points.
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    (dx * dx + dy * dy).sqrt()
}

/// Eye aspect ratio: `(|p1-p5| + |p2-p4|) / (2 * |p0-p3|)`.
pub fn eye_aspect_ratio(p: &[Point; 6]) -> Option<f64> {
    let horizontal = distance(p[0], p[3]);
    if horizontal == 0.0 {
        return None;
    }
    Some((distance(p[1], p[5]) + distance(p[2], p[4])) / (2.0 * horizontal))
}

/// Mouth aspect ratio: `|p4-p5| / |p0-p1|`.
pub fn mouth_aspect_ratio(p: &[Point; 6]) -> Option<f64> {
    let horizontal = distance(p[0], p[1]);
    if horizontal == 0.0 {
        return None;
    }
    Some(distance(p[4], p[5]) / horizontal)
}

/// Mean of the left and right eye aspect ratios for one frame.
pub fn bilateral_eye_ratio(landmarks: &[Point]) -> Option<f64> {
    let left = eye_aspect_ratio(&select(landmarks, &LEFT_EYE)?)?;
    let right = eye_aspect_ratio(&select(landmarks, &RIGHT_EYE)?)?;
    Some((left + right) / 2.0)
}

/// Mouth aspect ratio for one frame.
pub fn mouth_ratio(landmarks: &[Point]) -> Option<f64> {
    mouth_aspect_ratio(&select(landmarks, &MOUTH)?)
}

pub fn nose_tip(landmarks: &[Point]) -> Option<Point> {
    landmarks.get(NOSE_TIP).copied()
}

fn select(landmarks: &[Point], indices: &[usize; 6]) -> Option<[Point; 6]> {
    let mut out = [Point::default(); 6];
    for (slot, &idx) in out.iter_mut().zip(indices) {
        *slot = *landmarks.get(idx)?;
    }
    Some(out)
}
