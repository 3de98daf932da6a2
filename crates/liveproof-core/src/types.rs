use serde::{Deserialize, Serialize};

/// A facial landmark as reported by a provider, in fractions of the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
}

impl NormalizedLandmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Map to pixel space for a frame of the given size.
    ///
    /// Coordinates are truncated toward zero, so a landmark at `0.999` of a
    /// 100 px frame lands on pixel 99.
    pub fn to_pixel(&self, width: u32, height: u32) -> Point {
        Point {
            x: (f64::from(self.x) * f64::from(width)) as i32,
            y: (f64::from(self.y) * f64::from(height)) as i32,
        }
    }
}

/// Integer pixel coordinate of a landmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Denormalize a full landmark set against the current frame dimensions.
pub fn denormalize(landmarks: &[NormalizedLandmark], width: u32, height: u32) -> Vec<Point> {
    landmarks
        .iter()
        .map(|lm| lm.to_pixel(width, height))
        .collect()
}

/// Bounding box for a detected face, in frame pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Centre of the box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixel_scales_by_frame_size() {
        let lm = NormalizedLandmark::new(0.25, 0.5);
        assert_eq!(lm.to_pixel(640, 480), Point::new(160, 240));
    }

    #[test]
    fn test_to_pixel_truncates() {
        let lm = NormalizedLandmark::new(0.999, 0.0015);
        assert_eq!(lm.to_pixel(100, 1000), Point::new(99, 1));
    }

    #[test]
    fn test_to_pixel_negative_truncates_toward_zero() {
        // Mesh points can fall slightly outside the frame near its edge.
        let lm = NormalizedLandmark::new(-0.0078125, 1.0);
        assert_eq!(lm.to_pixel(128, 64), Point::new(-1, 64));
    }

    #[test]
    fn test_denormalize_preserves_order() {
        let set = [
            NormalizedLandmark::new(0.0, 0.0),
            NormalizedLandmark::new(0.5, 0.5),
            NormalizedLandmark::new(1.0, 0.25),
        ];
        let points = denormalize(&set, 1024, 512);
        assert_eq!(
            points,
            vec![Point::new(0, 0), Point::new(512, 256), Point::new(1024, 128)]
        );
    }

    #[test]
    fn test_bbox_center() {
        let b = BoundingBox { x: 10.0, y: 20.0, width: 100.0, height: 50.0, confidence: 0.9 };
        assert_eq!(b.center(), (60.0, 45.0));
    }
}
