//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format detection | `image::ImageReader::with_guessed_format` (magic bytes) |
//! | Decode (JPEG, PNG, GIF, WebP, TIFF, BMP) | `image` crate (pure Rust decoders) |
//! | Resample | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with configured quality |
//! | Encode → others | `image::DynamicImage::write_to` in the detected format |
//!
//! Animated GIFs decode to their first frame.

use super::backend::{DecodedImage, ImageBackend, ResizeError, format_name};
use super::params::{Quality, ResolvedSize};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use tracing::debug;

/// Formats that can be decoded and re-encoded, with their file extensions.
///
/// Output always uses the input's format, so a format is only worth accepting
/// when both directions are compiled in.
const SUPPORTED_FORMATS: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("bmp", ImageFormat::Bmp),
];

/// The single resampling filter used for every request.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Returns the file extensions whose formats round-trip through this backend.
pub fn supported_input_extensions() -> Vec<&'static str> {
    SUPPORTED_FORMATS
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
}

/// Whether `format` is in the decode/encode set.
pub fn is_supported(format: ImageFormat) -> bool {
    SUPPORTED_FORMATS.iter().any(|(_, fmt)| *fmt == format)
        && format.reading_enabled()
        && format.writing_enabled()
}

/// MIME type for a detected format, e.g. `image/jpeg`.
pub fn mime_type(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}

/// Resource ceilings applied to every decode and resample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendLimits {
    pub max_input_width: u32,
    pub max_input_height: u32,
    pub max_alloc_bytes: u64,
    pub max_output_pixels: u64,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            max_input_width: 16_384,
            max_input_height: 16_384,
            max_alloc_bytes: 512 * 1024 * 1024,
            max_output_pixels: 50_000_000,
        }
    }
}

/// Pure Rust backend using the `image` crate.
///
/// Built once per process; holds only read-only settings, so one instance is
/// shared across all concurrent invocations.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone)]
pub struct RustBackend {
    limits: BackendLimits,
    decode_limits: Limits,
    quality: Quality,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::with_settings(BackendLimits::default(), Quality::default())
    }

    pub fn with_settings(limits: BackendLimits, quality: Quality) -> Self {
        let mut decode_limits = Limits::default();
        decode_limits.max_image_width = Some(limits.max_input_width);
        decode_limits.max_image_height = Some(limits.max_input_height);
        decode_limits.max_alloc = Some(limits.max_alloc_bytes);
        Self {
            limits,
            decode_limits,
            quality,
        }
    }

    pub fn limits(&self) -> BackendLimits {
        self.limits
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode as JPEG at the configured quality. The baseline encoder takes 8-bit
/// gray or RGB only; anything else is converted to RGB8 first.
fn encode_jpeg(pixels: DynamicImage, quality: Quality) -> Result<Vec<u8>, ResizeError> {
    let pixels = match pixels.color() {
        ColorType::L8 | ColorType::Rgb8 => pixels,
        _ => DynamicImage::ImageRgb8(pixels.to_rgb8()),
    };
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
    pixels
        .write_with_encoder(encoder)
        .map_err(|e| ResizeError::Encode {
            format: ImageFormat::Jpeg,
            reason: e.to_string(),
        })?;
    Ok(buf)
}

fn encode_generic(pixels: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ResizeError> {
    let mut cursor = Cursor::new(Vec::new());
    pixels
        .write_to(&mut cursor, format)
        .map_err(|e| ResizeError::Encode {
            format,
            reason: e.to_string(),
        })?;
    Ok(cursor.into_inner())
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, ResizeError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ResizeError::Decode(format!("Failed to read image header: {e}")))?;

        let format = reader
            .format()
            .ok_or_else(|| ResizeError::Decode("Unrecognized image format".into()))?;
        if !is_supported(format) {
            return Err(ResizeError::Decode(format!(
                "Unsupported image format: {format:?}"
            )));
        }

        reader.limits(self.decode_limits.clone());
        let pixels = reader.decode().map_err(|e| {
            ResizeError::Decode(format!("Failed to decode {}: {e}", format_name(format)))
        })?;

        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ResizeError::Decode("Image has no pixels".into()));
        }

        debug!(
            format = format_name(format),
            width = pixels.width(),
            height = pixels.height(),
            "decoded source image"
        );
        Ok(DecodedImage::new(pixels, format))
    }

    fn resample(
        &self,
        image: DecodedImage,
        size: ResolvedSize,
    ) -> Result<DecodedImage, ResizeError> {
        if size.pixels() > self.limits.max_output_pixels {
            return Err(ResizeError::Resample(format!(
                "Output {size} exceeds the limit of {} pixels",
                self.limits.max_output_pixels
            )));
        }
        let footprint = resample_footprint(image.dimensions(), size);
        if footprint > self.limits.max_output_pixels {
            return Err(ResizeError::Resample(format!(
                "Resampling {}x{} to {size} needs a {footprint} pixel buffer, over the limit of {}",
                image.width(),
                image.height(),
                self.limits.max_output_pixels
            )));
        }

        let DecodedImage { pixels, format } = image;
        let resized = pixels.resize_exact(size.width, size.height, RESAMPLE_FILTER);

        if (resized.width(), resized.height()) != (size.width, size.height) {
            return Err(ResizeError::Resample(format!(
                "Filter produced {}x{} instead of {size}",
                resized.width(),
                resized.height()
            )));
        }

        Ok(DecodedImage::new(resized, format))
    }

    fn encode(&self, image: DecodedImage, format: ImageFormat) -> Result<Vec<u8>, ResizeError> {
        if !is_supported(format) {
            return Err(ResizeError::Encode {
                format,
                reason: "no encoder compiled in for this format".into(),
            });
        }
        match format {
            ImageFormat::Jpeg => encode_jpeg(image.pixels, self.quality),
            other => encode_generic(&image.pixels, other),
        }
    }
}

/// Largest buffer, in pixels, that `resize_exact` allocates.
///
/// The filter runs the vertical pass first, into a `native_width x height`
/// float buffer, then the horizontal pass into the output.
pub fn resample_footprint(native: (u32, u32), size: ResolvedSize) -> u64 {
    u64::from(native.0.max(size.width)) * u64::from(size.height)
}
