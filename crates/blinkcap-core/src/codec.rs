//! JPEG + base64 payload encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("cannot encode an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
    #[error("jpeg quality {0} outside 1..=100")]
    Quality(u8),
    #[error("jpeg encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Encode as baseline JPEG at `quality` (1..=100).
///
/// Grayscale images stay single-channel; everything else is flattened to RGB.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    if !(1..=100).contains(&quality) {
        return Err(CodecError::Quality(quality));
    }
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(CodecError::EmptyImage { width, height });
    }

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    match image {
        DynamicImage::ImageLuma8(gray) => {
            encoder.encode(gray.as_raw(), width, height, ExtendedColorType::L8)?
        }
        other => {
            let rgb = other.to_rgb8();
            encoder.encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?
        }
    }
    Ok(buf)
}

/// Encode as JPEG and wrap in standard base64, the form the host expects.
pub fn encode_jpeg_base64(image: &DynamicImage, quality: u8) -> Result<String, CodecError> {
    let jpeg = encode_jpeg(image, quality)?;
    Ok(STANDARD.encode(jpeg))
}
