use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageFormat};

use crate::error::{Error, Result};
use crate::pixel_buffer::{PixelBuffer, COMPONENTS};

/// Decode JPEG bytes into an RGB8 buffer.
///
/// Grayscale and other non-RGB decodes are rejected rather than converted.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| Error::decode(format!("invalid JPEG: {}", e)))?;

    let rgb = match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            return Err(Error::decode(format!(
                "unsupported pixel layout {:?} ({} components, expected {})",
                other.color(),
                other.color().channel_count(),
                COMPONENTS
            )))
        }
    };

    let (width, height) = rgb.dimensions();
    let stride = width as usize * COMPONENTS;
    let buffer = PixelBuffer::from_scanlines(width, height, COMPONENTS, rgb.as_raw().chunks_exact(stride.max(1)))?;

    tracing::info!(
        "Decoded {}x{} image (min luminance {})",
        width,
        height,
        buffer.min_luminance()
    );
    Ok(buffer)
}

/// Encode a buffer as baseline RGB JPEG at the given quality (1-100).
pub fn encode(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    if !(1..=100).contains(&quality) {
        return Err(Error::encode(format!("JPEG quality must be 1-100, got {}", quality)));
    }

    let (width, height) = buffer.dimensions();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(buffer.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| Error::encode(format!("failed to encode {}x{} JPEG: {}", width, height, e)))?;

    Ok(out)
}
