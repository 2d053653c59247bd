use crate::images::codec::{self, DEFAULT_JPEG_QUALITY};
use crate::images::ImageError;
use image::DynamicImage;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// A cover image held in decoded form, portable form, or both
///
/// At least one form is always present. The missing form is derived on
/// demand through [`CoverImage::ensure_decoded`] and
/// [`CoverImage::ensure_encoded`]; neither form can be replaced on its own,
/// so the two never drift apart.
#[derive(Clone)]
pub struct CoverImage {
    decoded: Option<Arc<DynamicImage>>,
    encoded: Option<String>,
}

impl CoverImage {
    /// Wraps a decoded image; the portable form is derived later
    pub fn from_decoded(image: DynamicImage) -> Self {
        Self {
            decoded: Some(Arc::new(image)),
            encoded: None,
        }
    }

    /// Wraps a stored portable form; decoding is deferred until needed
    pub fn from_encoded(encoded: String) -> Self {
        Self {
            decoded: None,
            encoded: Some(encoded),
        }
    }

    /// Builds a cover from downloaded bytes: decode, resize, encode
    ///
    /// Both forms are populated on success.
    pub fn from_download(bytes: &[u8], resize_factor: f32, quality: u8) -> Result<Self, ImageError> {
        let image = codec::resize(codec::decode(bytes)?, resize_factor);
        let encoded = codec::encode(&image, quality)?;
        Ok(Self {
            decoded: Some(Arc::new(image)),
            encoded: Some(encoded),
        })
    }

    /// Decoded form, if it has been derived
    pub fn decoded(&self) -> Option<&DynamicImage> {
        self.decoded.as_deref()
    }

    /// Portable form, if it has been derived
    pub fn encoded(&self) -> Option<&str> {
        self.encoded.as_deref()
    }

    /// Returns the decoded form, decoding the portable form on first use
    pub fn ensure_decoded(&mut self) -> Result<&DynamicImage, ImageError> {
        if self.decoded.is_none() {
            let encoded = self.encoded.as_deref().ok_or(ImageError::Empty)?;
            self.decoded = Some(Arc::new(codec::decode_portable(encoded)?));
        }
        self.decoded.as_deref().ok_or(ImageError::Empty)
    }

    /// Returns the portable form, encoding the decoded form on first use
    pub fn ensure_encoded(&mut self) -> Result<&str, ImageError> {
        if self.encoded.is_none() {
            let decoded = self.decoded.as_deref().ok_or(ImageError::Empty)?;
            self.encoded = Some(codec::encode(decoded, DEFAULT_JPEG_QUALITY)?);
        }
        self.encoded.as_deref().ok_or(ImageError::Empty)
    }

    /// Portable form without caching, for serialization through `&self`
    pub fn to_encoded(&self) -> Result<Cow<'_, str>, ImageError> {
        match (&self.encoded, &self.decoded) {
            (Some(encoded), _) => Ok(Cow::Borrowed(encoded)),
            (None, Some(decoded)) => Ok(Cow::Owned(codec::encode(decoded, DEFAULT_JPEG_QUALITY)?)),
            (None, None) => Err(ImageError::Empty),
        }
    }

    /// Pixel dimensions of the cover
    pub fn dimensions(&mut self) -> Result<(u32, u32), ImageError> {
        let image = self.ensure_decoded()?;
        Ok((image.width(), image.height()))
    }
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverImage")
            .field(
                "decoded",
                &self.decoded.as_ref().map(|d| (d.width(), d.height())),
            )
            .field("encoded_len", &self.encoded.as_ref().map(String::len))
            .finish()
    }
}
