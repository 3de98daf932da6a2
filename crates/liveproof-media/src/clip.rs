//! Animated clip decoding with frame sampling.
//!
//! The accepted containers are the animated formats the `image` crate can
//! iterate frame by frame: GIF, APNG and animated WebP. Every frame is
//! composited to RGBA by the decoder and flattened to RGB.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, ImageDecoder, ImageFormat, Limits, RgbImage};

use crate::frame::MediaError;

/// Animated container detected in an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    Gif,
    Apng,
    WebP,
}

impl ClipFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ClipFormat::Gif => "gif",
            ClipFormat::Apng => "apng",
            ClipFormat::WebP => "webp",
        }
    }
}

/// Bounds on how much memory one decoded clip may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipBudget {
    /// Clips whose canvas is wider or taller than this are refused before
    /// any frame is decoded.
    pub max_dimension: u32,
    /// Upper bound on the RGB bytes held across all kept frames.
    pub max_total_bytes: u64,
}

impl Default for ClipBudget {
    fn default() -> Self {
        Self {
            max_dimension: 4096,
            max_total_bytes: 128 * 1024 * 1024,
        }
    }
}

impl ClipBudget {
    fn decoder_limits(&self) -> Limits {
        let side = u64::from(self.max_dimension);
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        // One RGBA canvas plus one RGBA frame at the largest allowed size.
        limits.max_alloc = Some(side * side * 4 * 2);
        limits
    }
}

/// Decode every `stride`-th frame of an animated clip, keeping at most
/// `max_frames` frames. A stride of zero is treated as one.
///
/// Fails with [`MediaError::TooLarge`] once the clip exceeds `budget`.
pub fn decode_clip(
    bytes: &[u8],
    stride: usize,
    max_frames: usize,
    budget: ClipBudget,
) -> Result<(ClipFormat, Vec<RgbImage>), MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    let format =
        image::guess_format(bytes).map_err(|e| MediaError::UnknownFormat(e.to_string()))?;
    let limits = budget.decoder_limits();

    let (clip, frames) = match format {
        ImageFormat::Gif => {
            let mut decoder = GifDecoder::new(Cursor::new(bytes))?;
            decoder.set_limits(limits)?;
            (ClipFormat::Gif, decoder.into_frames())
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::with_limits(Cursor::new(bytes), limits)?;
            if !decoder.is_apng()? {
                return Err(MediaError::NotAnimated("png"));
            }
            (ClipFormat::Apng, decoder.apng()?.into_frames())
        }
        ImageFormat::WebP => {
            let mut decoder = WebPDecoder::new(Cursor::new(bytes))?;
            if !decoder.has_animation() {
                return Err(MediaError::NotAnimated("webp"));
            }
            decoder.set_limits(limits)?;
            (ClipFormat::WebP, decoder.into_frames())
        }
        other => {
            return Err(MediaError::UnsupportedContainer(
                other.extensions_str().first().copied().unwrap_or("unknown").to_string(),
            ))
        }
    };

    let sampled = sample(frames, stride, max_frames, budget.max_total_bytes)?;
    tracing::debug!(
        format = clip.as_str(),
        frames = sampled.len(),
        stride,
        "clip decoded"
    );
    Ok((clip, sampled))
}

fn sample(
    frames: Frames<'_>,
    stride: usize,
    max_frames: usize,
    max_total_bytes: u64,
) -> Result<Vec<RgbImage>, MediaError> {
    let mut kept = Vec::new();
    let mut held = 0u64;
    for frame in frames.step_by(stride.max(1)).take(max_frames) {
        let rgba = frame?.into_buffer();
        held += u64::from(rgba.width()) * u64::from(rgba.height()) * 3;
        if held > max_total_bytes {
            return Err(MediaError::TooLarge(format!(
                "clip exceeds {max_total_bytes} decoded bytes after {} frames",
                kept.len()
            )));
        }
        kept.push(DynamicImage::ImageRgba8(rgba).to_rgb8());
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgb, Rgba, RgbaImage};

    /// GIF whose i-th frame is filled with grey level `i * 10`.
    fn gif(frames: u8) -> Vec<u8> {
        sized_gif(frames, 6, 4)
    }

    fn sized_gif(frames: u8, width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buf);
            let frames = (0..frames).map(|i| {
                let level = i * 10;
                Frame::from_parts(
                    RgbaImage::from_pixel(width, height, Rgba([level, level, level, 255])),
                    0,
                    0,
                    Delay::from_numer_denom_ms(40, 1),
                )
            });
            encoder.encode_frames(frames).unwrap();
        }
        buf
    }

    fn still_png() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_gif_every_frame() {
        let (format, frames) = decode_clip(&gif(5), 1, 100, ClipBudget::default()).unwrap();
        assert_eq!(format, ClipFormat::Gif);
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0].dimensions(), (6, 4));
        assert_eq!(frames[3].get_pixel(0, 0), &Rgb([30, 30, 30]));
    }

    #[test]
    fn test_gif_stride() {
        let (_, frames) = decode_clip(&gif(7), 3, 100, ClipBudget::default()).unwrap();
        // Frames 0, 3, 6.
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].get_pixel(2, 2), &Rgb([30, 30, 30]));
        assert_eq!(frames[2].get_pixel(2, 2), &Rgb([60, 60, 60]));
    }

    #[test]
    fn test_max_frames_cap() {
        let (_, frames) = decode_clip(&gif(10), 1, 4, ClipBudget::default()).unwrap();
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn test_zero_stride_is_one() {
        let (_, frames) = decode_clip(&gif(3), 0, 100, ClipBudget::default()).unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_still_png_rejected() {
        assert!(matches!(
            decode_clip(&still_png(), 1, 100, ClipBudget::default()),
            Err(MediaError::NotAnimated("png"))
        ));
    }

    #[test]
    fn test_unsupported_container() {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Bmp)
            .unwrap();
        assert!(matches!(
            decode_clip(&buf, 1, 100, ClipBudget::default()),
            Err(MediaError::UnsupportedContainer(_))
        ));
    }

    #[test]
    fn test_decoded_bytes_over_budget_rejected() {
        // 12 uniform 256x256 frames compress to a few KB but decode to 2.25 MiB.
        let clip = sized_gif(12, 256, 256);
        let budget = ClipBudget {
            max_dimension: 4096,
            max_total_bytes: 256 * 256 * 3 * 4,
        };
        assert!(matches!(
            decode_clip(&clip, 1, 600, budget),
            Err(MediaError::TooLarge(_))
        ));

        // The same clip fits once the stride keeps only four frames.
        let (_, frames) = decode_clip(&clip, 3, 600, budget).unwrap();
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        let budget = ClipBudget {
            max_dimension: 64,
            ..ClipBudget::default()
        };
        assert!(matches!(
            decode_clip(&sized_gif(2, 128, 32), 1, 600, budget),
            Err(MediaError::TooLarge(_))
        ));
    }

    #[test]
    fn test_empty_upload() {
        assert!(matches!(decode_clip(&[], 1, 10, ClipBudget::default()), Err(MediaError::Empty)));
    }
}
