//! Image encoding for composites
//!
//! Converts an [`ImageBuffer`] into compressed bytes for storage.
//!
//! # Format Support
//!
//! - **PNG**: Lossless, three compression levels picked from the quality
//! - **JPEG**: Lossy with quality 1-100, no alpha channel, at most 65535
//!   pixels per side (long captures can exceed this)
//! - **WebP**: Lossless only in image crate v0.25 (quality is ignored)
//!
//! # Examples
//!
//! ```
//! use scrollshot_core::{capture::ImageBuffer, model::ImageFormat, util::encode::encode_image};
//!
//! let img = ImageBuffer::from_test_pattern(64, 256, 1);
//! let png = encode_image(&img, ImageFormat::Png, 80).unwrap();
//! assert_eq!(&png[0..4], &[137, 80, 78, 71]);
//! ```

use std::io::Cursor;

use image::{
    ImageEncoder,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
        webp::WebPEncoder,
    },
};

use crate::{
    capture::ImageBuffer,
    error::{CaptureError, CaptureResult},
    model::ImageFormat,
};

/// Largest width or height a JPEG stream can describe
pub const JPEG_MAX_DIMENSION: u32 = 65_535;

/// Maps a 0-100 quality to a PNG compression level
pub fn compression_type_from_quality(quality: u8) -> CompressionType {
    match quality {
        0..=33 => CompressionType::Fast,
        34..=66 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encodes as PNG with default compression
pub fn encode_png(buffer: &ImageBuffer) -> CaptureResult<Vec<u8>> {
    encode_png_with_compression(buffer, CompressionType::Default)
}

pub fn encode_png_with_compression(
    buffer: &ImageBuffer,
    compression: CompressionType,
) -> CaptureResult<Vec<u8>> {
    let mut output = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(Cursor::new(&mut output), compression, FilterType::Adaptive);

    let (width, height) = buffer.dimensions();
    encoder
        .write_image(buffer.as_bytes(), width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| CaptureError::EncodingFailed {
            format: "png".to_string(),
            reason: e.to_string(),
        })?;

    Ok(output)
}

/// Encodes as JPEG, dropping alpha
///
/// # Errors
///
/// Returns [`CaptureError::EncodingFailed`] if either side exceeds
/// [`JPEG_MAX_DIMENSION`] or the encoder fails.
pub fn encode_jpeg(buffer: &ImageBuffer, quality: u8) -> CaptureResult<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    let (width, height) = buffer.dimensions();

    if width > JPEG_MAX_DIMENSION || height > JPEG_MAX_DIMENSION {
        return Err(CaptureError::EncodingFailed {
            format: "jpeg".to_string(),
            reason: format!(
                "{}x{} exceeds the JPEG limit of {} pixels per side",
                width, height, JPEG_MAX_DIMENSION
            ),
        });
    }

    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut output), quality);
    let rgb = buffer.to_rgb8();

    encoder
        .write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| CaptureError::EncodingFailed {
            format: "jpeg".to_string(),
            reason: e.to_string(),
        })?;

    Ok(output)
}

/// Encodes as lossless WebP
pub fn encode_webp(buffer: &ImageBuffer) -> CaptureResult<Vec<u8>> {
    let mut output = Vec::new();
    let encoder = WebPEncoder::new_lossless(Cursor::new(&mut output));

    let (width, height) = buffer.dimensions();
    encoder
        .write_image(buffer.as_bytes(), width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| CaptureError::EncodingFailed {
            format: "webp".to_string(),
            reason: e.to_string(),
        })?;

    Ok(output)
}

/// Encodes `buffer` in `format`; `quality` drives PNG compression level and
/// JPEG quality
pub fn encode_image(
    buffer: &ImageBuffer,
    format: ImageFormat,
    quality: u8,
) -> CaptureResult<Vec<u8>> {
    match format {
        ImageFormat::Png => {
            encode_png_with_compression(buffer, compression_type_from_quality(quality))
        }
        ImageFormat::Jpeg => encode_jpeg(buffer, quality),
        ImageFormat::Webp => encode_webp(buffer),
    }
}
