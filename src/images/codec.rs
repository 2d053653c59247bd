//! Decode, resize and portable-encode cover images
//!
//! The portable form is a JPEG wrapped in a base64 data URI so that it can be
//! stored inline in the JSON snapshot.

use crate::images::ImageError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

/// Prefix of the stored data URI
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// JPEG quality used when a decoded image has to be encoded on demand
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Decodes downloaded bytes, guessing the format from the content
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes).map_err(ImageError::Decode)
}

/// Scales both dimensions by `factor`, truncating towards zero
///
/// A factor of 1.0 returns the image unchanged. Dimensions never drop below
/// one pixel.
pub fn resize(image: DynamicImage, factor: f32) -> DynamicImage {
    if factor == 1.0 {
        return image;
    }
    let (width, height) = scaled_dimensions(image.width(), image.height(), factor);
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Target dimensions for a uniform resize
pub fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let scale = |v: u32| ((f64::from(v) * f64::from(factor)) as u32).max(1);
    (scale(width), scale(height))
}

/// Encodes an image as a JPEG data URI
pub fn encode(image: &DynamicImage, quality: u8) -> Result<String, ImageError> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(ImageError::Encode)?;
    Ok(format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(bytes)))
}

/// Decodes a stored portable form
///
/// Accepts both the data URI form and a bare base64 payload.
pub fn decode_portable(encoded: &str) -> Result<DynamicImage, ImageError> {
    let payload = match encoded.split_once("base64,") {
        Some((_, payload)) => payload,
        None => encoded,
    };
    let bytes = STANDARD.decode(payload.trim())?;
    decode(&bytes)
}
