//! Contrast and saturation adjustment for pastel map tiles.
//!
//! Both operations blend each pixel against a degenerate image and
//! extrapolate by the given factor: `out = base + factor * (pixel - base)`.
//! Contrast blends against the image's mean luma, saturation against each
//! pixel's own luma. A factor of 1.0 leaves the image unchanged.

use image::{Rgb, RgbImage};

/// Default contrast factor.
pub const DEFAULT_CONTRAST: f32 = 1.6;

/// Default saturation factor.
pub const DEFAULT_SATURATION: f32 = 1.3;

/// Default output edge length in pixels.
pub const DEFAULT_OUTPUT_SIZE: u32 = 1024;

/// Final overlay rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceSettings {
    /// Output edge length; the overlay is square.
    pub output_size: u32,
    /// Contrast factor.
    pub contrast: f32,
    /// Saturation factor.
    pub saturation: f32,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            output_size: DEFAULT_OUTPUT_SIZE,
            contrast: DEFAULT_CONTRAST,
            saturation: DEFAULT_SATURATION,
        }
    }
}

/// ITU-R 601-2 luma, as used for grayscale conversion.
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

fn blend(base: f32, value: u8, factor: f32) -> u8 {
    (base + factor * (value as f32 - base)).clamp(0.0, 255.0) as u8
}

/// Scale contrast around the mean luma.
pub fn adjust_contrast(image: &mut RgbImage, factor: f32) {
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let total: u64 = image.pixels().map(|p| luma(p) as u64).sum();
    let mean = (total as f64 / count as f64 + 0.5).floor() as f32;

    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = blend(mean, *channel, factor);
        }
    }
}

/// Scale saturation around each pixel's luma.
pub fn adjust_saturation(image: &mut RgbImage, factor: f32) {
    for pixel in image.pixels_mut() {
        let gray = luma(pixel) as f32;
        for channel in pixel.0.iter_mut() {
            *channel = blend(gray, *channel, factor);
        }
    }
}

/// Apply contrast, then saturation.
pub fn enhance(image: &mut RgbImage, settings: &EnhanceSettings) {
    adjust_contrast(image, settings.contrast);
    adjust_saturation(image, settings.saturation);
}
