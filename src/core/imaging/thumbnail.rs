//! Fast SIMD-accelerated thumbnail generation.
//!
//! Uses the fast_image_resize crate (5-14x faster than image crate resize,
//! AVX2/NEON where available) to fit previews inside a bounding box.

use fast_image_resize::{images::Image, PixelType, ResizeOptions, Resizer};
use image::{DynamicImage, ImageBuffer, Rgb};

use super::codec;
use crate::error::ImagingError;

/// JPEG quality of generated thumbnails
const THUMBNAIL_QUALITY: u8 = 85;

/// Decode `bytes` and re-encode a JPEG preview fitted inside an `edge`
/// pixel box.
pub fn thumbnail_jpeg(bytes: &[u8], edge: u32) -> Result<Vec<u8>, ImagingError> {
    let image = codec::decode_bytes(bytes)?;
    let fitted = fit_inside(&image, edge)?;
    codec::encode_jpeg(&fitted, THUMBNAIL_QUALITY)
}

/// Resize `image` to fit inside an `edge` x `edge` box, preserving aspect
/// ratio. Images already inside the box pass through unchanged.
pub fn fit_inside(image: &DynamicImage, edge: u32) -> Result<DynamicImage, ImagingError> {
    let resize_error = |reason: String| ImagingError::Resize { reason };

    if edge == 0 {
        return Err(resize_error("bounding box edge must be non-zero".to_string()));
    }

    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(resize_error("source image is empty".to_string()));
    }

    let longest = width.max(height);
    if longest <= edge {
        return Ok(image.clone());
    }

    let scale = edge as f64 / longest as f64;
    let dst_width = ((width as f64 * scale).round() as u32).max(1);
    let dst_height = ((height as f64 * scale).round() as u32).max(1);

    let rgb = image.to_rgb8();
    let src = Image::from_vec_u8(width, height, rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| resize_error(e.to_string()))?;
    let mut dst = Image::new(dst_width, dst_height, PixelType::U8x3);

    // Bilinear keeps enough detail for blur statistics at a fraction of
    // Lanczos cost.
    let options = ResizeOptions::new().resize_alg(fast_image_resize::ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));
    let mut resizer = Resizer::new();
    resizer
        .resize(&src, &mut dst, &options)
        .map_err(|e| resize_error(e.to_string()))?;

    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(dst_width, dst_height, dst.into_vec())
            .ok_or_else(|| resize_error("resized buffer size mismatch".to_string()))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        });
        DynamicImage::ImageRgb8(buffer)
    }

    #[test]
    fn landscape_images_fit_the_long_edge() {
        let fitted = fit_inside(&gradient_image(200, 100), 50).unwrap();
        assert_eq!(fitted.width(), 50);
        assert_eq!(fitted.height(), 25);
    }

    #[test]
    fn portrait_images_fit_the_long_edge() {
        let fitted = fit_inside(&gradient_image(100, 400), 100).unwrap();
        assert_eq!(fitted.width(), 25);
        assert_eq!(fitted.height(), 100);
    }

    #[test]
    fn small_images_pass_through_unchanged() {
        let fitted = fit_inside(&gradient_image(30, 20), 50).unwrap();
        assert_eq!(fitted.width(), 30);
        assert_eq!(fitted.height(), 20);
    }

    #[test]
    fn extreme_aspect_ratios_never_collapse_to_zero() {
        let fitted = fit_inside(&gradient_image(2000, 2), 16).unwrap();
        assert_eq!(fitted.width(), 16);
        assert_eq!(fitted.height(), 1);
    }

    #[test]
    fn zero_edge_is_rejected() {
        assert!(fit_inside(&gradient_image(10, 10), 0).is_err());
    }

    #[test]
    fn thumbnail_jpeg_produces_decodable_bytes() {
        let bytes = codec::encode_jpeg(&gradient_image(300, 200), 90).unwrap();
        let thumbnail = thumbnail_jpeg(&bytes, 64).unwrap();

        let decoded = codec::decode_bytes(&thumbnail).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 43);
    }
}
