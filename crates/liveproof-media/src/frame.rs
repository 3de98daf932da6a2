//! Still frame decoding.

use image::RgbImage;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("empty payload")]
    Empty,
    #[error("unrecognised image data: {0}")]
    UnknownFormat(String),
    #[error("unsupported clip container: {0}")]
    UnsupportedContainer(String),
    #[error("{0} is a still image, not an animation")]
    NotAnimated(&'static str),
    #[error("decoded media too large: {0}")]
    TooLarge(String),
    #[error("decode failed: {0}")]
    Decode(image::ImageError),
}

impl From<image::ImageError> for MediaError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Limits(limit) => MediaError::TooLarge(limit.to_string()),
            other => MediaError::Decode(other),
        }
    }
}

/// Decode a single encoded image (JPEG, PNG, WebP, ...) into an RGB frame.
pub fn decode_still(bytes: &[u8]) -> Result<RgbImage, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    let format =
        image::guess_format(bytes).map_err(|e| MediaError::UnknownFormat(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    tracing::trace!(?format, width = img.width(), height = img.height(), "still decoded");
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_png_still() {
        let mut img = RgbImage::new(8, 4);
        img.put_pixel(3, 2, Rgb([10, 200, 30]));
        let frame = decode_still(&encode(img, ImageFormat::Png)).unwrap();
        assert_eq!(frame.dimensions(), (8, 4));
        assert_eq!(frame.get_pixel(3, 2), &Rgb([10, 200, 30]));
    }

    #[test]
    fn test_decode_jpeg_still() {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 120, 120]));
        let frame = decode_still(&encode(img, ImageFormat::Jpeg)).unwrap();
        assert_eq!(frame.dimensions(), (16, 16));
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(decode_still(&[]), Err(MediaError::Empty)));
    }

    #[test]
    fn test_garbage_payload() {
        let result = decode_still(b"definitely not an image");
        assert!(matches!(result, Err(MediaError::UnknownFormat(_))));
    }

    #[test]
    fn test_truncated_png() {
        let bytes = encode(RgbImage::new(32, 32), ImageFormat::Png);
        let result = decode_still(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(MediaError::Decode(_))));
    }
}
