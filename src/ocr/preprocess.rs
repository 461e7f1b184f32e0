//! Raster preprocessing before OCR.
//!
//! Scanned pages go through grayscale conversion, contrast stretch,
//! median denoise and a light unsharp mask to raise OCR yield on low
//! quality scans. The steps mirror the classic scan-cleanup chain.

use image::{DynamicImage, GrayImage};
use imageproc::filter::median_filter;

/// Maximum raster width fed to the OCR engine. Wider pages are downscaled
/// without enlargement of smaller ones.
pub const MAX_RASTER_WIDTH: u32 = 1500;

/// Downscale an image to [`MAX_RASTER_WIDTH`], preserving aspect ratio.
pub fn downscale_for_ocr(image: DynamicImage) -> DynamicImage {
    if image.width() <= MAX_RASTER_WIDTH {
        return image;
    }
    let height = (image.height() as u64 * MAX_RASTER_WIDTH as u64 / image.width() as u64) as u32;
    image.resize(MAX_RASTER_WIDTH, height.max(1), image::imageops::FilterType::Triangle)
}

/// Run the full cleanup chain on a page image.
pub fn preprocess_for_ocr(image: &DynamicImage) -> DynamicImage {
    let gray = image.to_luma8();
    let stretched = stretch_contrast(&gray);
    let denoised = median_filter(&stretched, 1, 1);
    DynamicImage::ImageLuma8(denoised).unsharpen(1.0, 2)
}

/// Linear contrast stretch to the full 0..255 range.
fn stretch_contrast(image: &GrayImage) -> GrayImage {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for pixel in image.pixels() {
        min = min.min(pixel.0[0]);
        max = max.max(pixel.0[0]);
    }

    // Flat images (blank pages) have nothing to stretch
    if max <= min {
        return image.clone();
    }

    let range = (max - min) as f32;
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let value = (pixel.0[0] - min) as f32 / range * 255.0;
        pixel.0[0] = value.round().clamp(0.0, 255.0) as u8;
    }
    out
}
