//! Image validation and normalization.
//!
//! Validation runs strictly before decoding: existence, file size, magic
//! bytes, animation, then dimensions. The surviving image is EXIF-oriented,
//! converted to 8-bit RGB and downsized with a bilinear filter so neither
//! side exceeds the configured target resolution.

pub mod magic;

use crate::core::config::GeneralConfig;
use crate::error::{GuardError, Result};
use crate::types::{Dimensions, ImageInfo};
use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, RgbImage};
use self::magic::FormatTag;
use std::io::Cursor;
use std::path::Path;

/// Validated, normalized image artifact handed to the detection modules.
///
/// Owned by the orchestrator for the lifetime of one request; modules only
/// ever see a shared reference.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Normalized 8-bit RGB buffer.
    pub rgb: RgbImage,
    pub info: ImageInfo,
}

impl PreparedImage {
    /// Pixel count of the normalized buffer.
    pub fn area(&self) -> u64 {
        u64::from(self.info.normalized_dimensions.width) * u64::from(self.info.normalized_dimensions.height)
    }

    /// The normalized buffer as a `DynamicImage` (clones the pixel data).
    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgb8(self.rgb.clone())
    }
}

/// Load, validate and normalize an image from disk.
///
/// # Errors
///
/// * `GuardError::NotFound` when the path does not exist.
/// * `GuardError::InvalidImage` for a directory, an oversized file, a
///   magic-byte mismatch, an animated image, oversized dimensions, or
///   undecodable content.
pub fn load_image(path: &Path, config: &GeneralConfig) -> Result<PreparedImage> {
    if !path.exists() {
        return Err(GuardError::NotFound { path: path.to_path_buf() });
    }
    if path.is_dir() {
        return Err(GuardError::invalid_image("Provided path is a directory, not an image"));
    }

    let size_bytes = std::fs::metadata(path)?.len();
    let max_bytes = config.max_bytes();
    if size_bytes > max_bytes {
        return Err(GuardError::invalid_image(format!(
            "Image size {size_bytes} exceeds max_bytes={max_bytes}"
        )));
    }

    let bytes = std::fs::read(path)?;
    let header = &bytes[..bytes.len().min(magic::HEADER_LEN)];

    if config.validate_magic {
        let check = magic::validate_magic_bytes(path, header);
        if !check.is_valid {
            if let Some(expected) = check.expected {
                let detected = check.detected.map_or_else(|| "unknown".to_string(), |tag| tag.to_string());
                return Err(GuardError::invalid_image(format!(
                    "Magic byte mismatch: file extension suggests {expected}, but content appears to be {detected}"
                )));
            }
        }
    }

    let format = magic::detect_format(header).or_else(|| magic::format_for_extension(path));

    if is_animated(format, &bytes) {
        return Err(GuardError::invalid_image("Animated images are not supported"));
    }

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| GuardError::invalid_image(format!("Failed to load image: {e}")))?;

    if decoded.width() > config.max_dimension || decoded.height() > config.max_dimension {
        return Err(GuardError::invalid_image("Image dimensions exceed allowed maximum"));
    }

    let oriented = apply_exif_orientation(decoded, &bytes);
    let rgb = oriented.to_rgb8();
    let dimensions = Dimensions {
        width: rgb.width(),
        height: rgb.height(),
    };

    let normalized = normalize_resolution(rgb, config.target_resolution);
    let normalized_dimensions = Dimensions {
        width: normalized.width(),
        height: normalized.height(),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(PreparedImage {
        rgb: normalized,
        info: ImageInfo {
            filename,
            format: format.map(|tag| tag.to_string()),
            dimensions,
            size_bytes,
            normalized_dimensions,
        },
    })
}

/// Multi-frame detection for the two formats that can animate.
fn is_animated(format: Option<FormatTag>, bytes: &[u8]) -> bool {
    match format {
        Some(FormatTag::Gif) => match GifDecoder::new(Cursor::new(bytes)) {
            Ok(decoder) => decoder.into_frames().take(2).count() > 1,
            Err(_) => false,
        },
        Some(FormatTag::Webp) => match WebPDecoder::new(Cursor::new(bytes)) {
            Ok(decoder) => decoder.has_animation(),
            Err(_) => false,
        },
        _ => false,
    }
}

/// Apply the EXIF orientation tag, if present, so analysis sees the image
/// upright. Formats without EXIF pass through unchanged.
fn apply_exif_orientation(image: DynamicImage, bytes: &[u8]) -> DynamicImage {
    let orientation = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
        .and_then(|data| {
            data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        });

    match orientation {
        Some(2) => image.fliph(),
        Some(3) => image.rotate180(),
        Some(4) => image.flipv(),
        Some(5) => image.rotate90().fliph(),
        Some(6) => image.rotate90(),
        Some(7) => image.rotate270().fliph(),
        Some(8) => image.rotate270(),
        _ => image,
    }
}

/// Downsize so `max(width, height) <= max_dimension`, preserving aspect
/// ratio with bilinear filtering. Smaller images pass through unchanged.
pub fn normalize_resolution(rgb: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = rgb.dimensions();
    let largest = width.max(height);
    if largest <= max_dimension {
        return rgb;
    }
    let scale = f64::from(max_dimension) / f64::from(largest);
    let new_width = ((f64::from(width) * scale) as u32).max(1);
    let new_height = ((f64::from(height) * scale) as u32).max(1);
    image::imageops::resize(&rgb, new_width, new_height, FilterType::Triangle)
}
