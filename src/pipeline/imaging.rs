//! Shared image loading for the pipeline.
//!
//! Validates input bytes, decodes, and corrects EXIF orientation before any
//! geometric work. Phone photos of identity cards embed rotation in EXIF
//! tag 0x0112; without correction the face detector sees a sideways card.

use std::io::Cursor;

use image::DynamicImage;
use thiserror::Error;

/// Maximum input image size before rejecting. Guards decode against
/// corrupt/adversarial files.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Smallest plausible raster file (a minimal PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("image data too small to be valid")]
    TooSmall,

    #[error("image data exceeds {0}MB limit")]
    TooLarge(usize),

    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// Validate image bytes before decoding. Cheap early rejection of clearly
/// invalid input.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ImagingError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ImagingError::TooSmall);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImagingError::TooLarge(MAX_IMAGE_BYTES / (1024 * 1024)));
    }
    Ok(())
}

/// Decode image bytes and apply the EXIF orientation transform.
pub fn load_oriented(bytes: &[u8]) -> Result<DynamicImage, ImagingError> {
    validate_image_bytes(bytes)?;
    let img = image::load_from_memory(bytes)
        .map_err(|e| ImagingError::Decode(e.to_string()))?;
    Ok(apply_orientation(img, read_exif_orientation(bytes)))
}

/// Read EXIF orientation from raw image bytes. 1 (normal) when there is no
/// EXIF data or no orientation tag.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation value (1–8) to a decoded image.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        1 => img,
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
