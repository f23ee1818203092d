//! Grayscale decoding and normalization ahead of face detection

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::gaussian_blur_f32;

use super::ImageError;

/// Photos are shrunk to fit this box before detection
pub const MAX_WIDTH: u32 = 500;
pub const MAX_HEIGHT: u32 = 500;

/// Decode raw bytes to a single-channel grayscale image
pub fn decode_grayscale(data: &[u8]) -> Result<GrayImage, ImageError> {
    let img = image::load_from_memory(data).map_err(|e| ImageError::Decode(e.to_string()))?;
    Ok(img.to_luma8())
}

/// Shrink an image to fit within `max_width` x `max_height`, preserving
/// aspect ratio. Images already inside the box are returned unchanged;
/// nothing is ever enlarged.
pub fn resize_to_fit(img: &GrayImage, max_width: u32, max_height: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img.clone();
    }

    let aspect_ratio = width as f32 / height as f32;
    let (new_width, new_height) = if aspect_ratio > 1.0 {
        // Landscape orientation
        (max_width, (max_width as f32 / aspect_ratio) as u32)
    } else {
        // Portrait or square orientation
        ((max_height as f32 * aspect_ratio) as u32, max_height)
    };

    imageops::resize(
        img,
        new_width.max(1),
        new_height.max(1),
        FilterType::Triangle,
    )
}

/// Contrast and illumination normalization.
///
/// Histogram equalization followed by division by a blurred copy, which
/// flattens uneven lighting that interferes with the detector.
pub fn normalize(img: &GrayImage) -> GrayImage {
    let equalized = equalize_histogram(img);
    let smooth = gaussian_blur_f32(&equalized, 4.0);

    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in equalized.enumerate_pixels() {
        let denom = u32::from(smooth.get_pixel(x, y)[0]);
        let value = if denom == 0 {
            0
        } else {
            (u32::from(pixel[0]) * 255 / denom).min(255) as u8
        };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Full preprocessing pipeline: decode, shrink, normalize
pub fn prepare(data: &[u8]) -> Result<GrayImage, ImageError> {
    let gray = decode_grayscale(data)?;
    let resized = resize_to_fit(&gray, MAX_WIDTH, MAX_HEIGHT);
    Ok(normalize(&resized))
}
