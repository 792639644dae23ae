//! Image decoding and bounded-box resizing.
//!
//! Resized renditions are always JPEG. Originals keep whatever format they
//! were uploaded in; [`sniff_mime`] recovers their content type from the
//! leading bytes.

use std::io::Cursor;
use std::num::NonZeroU32;

use cas::OCTET_STREAM;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Content type of every resized rendition.
pub const RESIZED_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode resized image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Produces a rendition that fits inside a bounding box.
///
/// Implementations are synchronous and CPU bound; callers run them on the
/// blocking pool.
pub trait Resizer: Send + Sync {
    fn resize(
        &self,
        data: &[u8],
        max_width: NonZeroU32,
        max_height: NonZeroU32,
    ) -> Result<Vec<u8>, ResizeError>;
}

/// Aspect-preserving thumbnailer backed by the `image` crate.
///
/// Images already inside the box are re-encoded at their own size, never
/// enlarged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThumbnailResizer;

impl Resizer for ThumbnailResizer {
    fn resize(
        &self,
        data: &[u8],
        max_width: NonZeroU32,
        max_height: NonZeroU32,
    ) -> Result<Vec<u8>, ResizeError> {
        let img = image::load_from_memory(data).map_err(ResizeError::Decode)?;
        let (width, height) = (max_width.get(), max_height.get());

        let fitted = if img.width() <= width && img.height() <= height {
            img
        } else {
            img.thumbnail(width, height)
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(fitted.to_rgb8());
        let mut buf = Cursor::new(Vec::new());
        rgb.write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(ResizeError::Encode)?;
        Ok(buf.into_inner())
    }
}

/// Content type guessed from magic bytes, `application/octet-stream` if unknown.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|format| format.to_mime_type())
        .unwrap_or(OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 255]));
        let img = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
            _ => DynamicImage::ImageRgba8(img),
        };
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn dims(data: &[u8]) -> (u32, u32) {
        image::load_from_memory(data).unwrap().dimensions()
    }

    fn nz(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).unwrap()
    }

    #[test]
    fn test_landscape_fits_box() {
        let original = encode(600, 450, ImageFormat::Png);
        let resized = ThumbnailResizer.resize(&original, nz(300), nz(300)).unwrap();

        assert_eq!(dims(&resized), (300, 225));
        assert_eq!(sniff_mime(&resized), RESIZED_CONTENT_TYPE);
    }

    #[test]
    fn test_portrait_fits_box() {
        let original = encode(400, 800, ImageFormat::Png);
        let resized = ThumbnailResizer.resize(&original, nz(100), nz(100)).unwrap();
        assert_eq!(dims(&resized), (50, 100));
    }

    #[test]
    fn test_small_image_is_not_enlarged() {
        let original = encode(40, 30, ImageFormat::Png);
        let resized = ThumbnailResizer.resize(&original, nz(300), nz(300)).unwrap();

        assert_eq!(dims(&resized), (40, 30));
        assert_eq!(sniff_mime(&resized), "image/jpeg");
    }

    #[test]
    fn test_undecodable_input() {
        let err = ThumbnailResizer
            .resize(b"definitely not an image", nz(10), nz(10))
            .unwrap_err();
        assert!(matches!(err, ResizeError::Decode(_)));
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&encode(2, 2, ImageFormat::Png)), "image/png");
        assert_eq!(sniff_mime(&encode(2, 2, ImageFormat::Jpeg)), "image/jpeg");
        assert_eq!(sniff_mime(b"plain text"), OCTET_STREAM);
        assert_eq!(sniff_mime(b""), OCTET_STREAM);
    }
}
