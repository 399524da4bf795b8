//! Pixel-level composition primitives for generated artwork.
//!
//! Only the generator calls these. All functions are pure and CPU-bound;
//! callers run them on a blocking thread.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::error::Result;

pub const HERO_WIDTH: u32 = 1024;
pub const HERO_HEIGHT: u32 = 550;
pub const PORTRAIT_WIDTH: u32 = 600;
pub const PORTRAIT_HEIGHT: u32 = 900;

const HEADER_WIDTH: u32 = 600;
const HEADER_HEIGHT: u32 = 280;
const HEADER_OFFSET_Y: i64 = 132;
const BACKDROP_BLUR_SIGMA: f32 = 35.0;
const BACKDROP_BRIGHTNESS: f32 = 0.2;

/// Hero art is a store screenshot resized to the library's hero resolution.
pub fn hero_from_screenshot(screenshot: &DynamicImage) -> DynamicImage {
    screenshot.resize_exact(HERO_WIDTH, HERO_HEIGHT, FilterType::Lanczos3)
}

/// Portrait art is composed from the header capsule: the header stretched
/// over the upper two thirds of the canvas and mirrored into the lower
/// third, darkened and blurred, with the untouched header overlaid at a
/// fixed vertical offset.
pub fn compose_portrait(header: &DynamicImage) -> DynamicImage {
    let upper_height = (PORTRAIT_HEIGHT as f32 / 1.5) as u32;
    let lower_height = PORTRAIT_HEIGHT - upper_height;

    let mut upper = header
        .resize_exact(PORTRAIT_WIDTH, upper_height, FilterType::Lanczos3)
        .to_rgba8();
    let mut lower = header
        .resize_exact(PORTRAIT_WIDTH, lower_height, FilterType::Lanczos3)
        .to_rgba8();
    adjust_brightness(&mut upper, BACKDROP_BRIGHTNESS);
    adjust_brightness(&mut lower, BACKDROP_BRIGHTNESS);
    let lower = mirror_vertically(&lower);

    let mut backdrop = RgbaImage::new(PORTRAIT_WIDTH, PORTRAIT_HEIGHT);
    imageops::replace(&mut backdrop, &upper, 0, 0);
    imageops::replace(&mut backdrop, &lower, 0, i64::from(upper_height));
    let mut canvas = imageops::blur(&backdrop, BACKDROP_BLUR_SIGMA);

    let foreground = header
        .resize_exact(HEADER_WIDTH, HEADER_HEIGHT, FilterType::Lanczos3)
        .to_rgba8();
    imageops::replace(&mut canvas, &foreground, 0, HEADER_OFFSET_Y);

    DynamicImage::ImageRgba8(canvas)
}

/// Scales the color channels by `factor`, leaving alpha untouched.
pub fn adjust_brightness(image: &mut RgbaImage, factor: f32) {
    for pixel in image.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel =
                (f32::from(*channel) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
}

pub fn mirror_vertically(image: &RgbaImage) -> RgbaImage {
    imageops::flip_vertical(image)
}

/// Full-quality JPEG bytes; generated art is written once and read many
/// times.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, 100);
    image.to_rgb8().write_with_encoder(encoder)?;
    Ok(out)
}
