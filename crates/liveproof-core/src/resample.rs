use image::RgbImage;

/// Bilinearly sample an RGB frame at a sub-pixel position (pixel centres at
/// integer + 0.5 are addressed as integers).
///
/// Returns `None` when the position lies outside the frame; callers decide the
/// fill value.
pub(crate) fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Option<[f32; 3]> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let max_x = width as f32 - 0.5;
    let max_y = height as f32 - 0.5;
    if x < -0.5 || y < -0.5 || x > max_x || y > max_y {
        return None;
    }

    let x0 = (x.floor() as i64).clamp(0, width as i64 - 1) as u32;
    let y0 = (y.floor() as i64).clamp(0, height as i64 - 1) as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = (x - x.floor()).clamp(0.0, 1.0);
    let fy = (y - y.floor()).clamp(0.0, 1.0);

    let tl = image.get_pixel(x0, y0).0;
    let tr = image.get_pixel(x1, y0).0;
    let bl = image.get_pixel(x0, y1).0;
    let br = image.get_pixel(x1, y1).0;

    let mut out = [0.0f32; 3];
    for (c, value) in out.iter_mut().enumerate() {
        *value = tl[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + tr[c] as f32 * fx * (1.0 - fy)
            + bl[c] as f32 * (1.0 - fx) * fy
            + br[c] as f32 * fx * fy;
    }
    Some(out)
}
