//! Cover image acquisition and encoding
//!
//! This module contains:
//! - `codec`: decode, resize and portable encoding of cover images
//! - `CoverImage`: the single owned value holding a cover in either form
//! - `acquirer`: the background worker pool that (re-)downloads covers

mod acquirer;
pub mod codec;
mod cover;

pub use acquirer::{progress_percent, ImageAcquirer, ImageProgress, ImageSession, ProgressCounters};
pub use cover::CoverImage;

use thiserror::Error;

/// Errors raised while decoding or encoding a cover
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Cover holds neither a decoded nor an encoded image")]
    Empty,
}
