//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: decode, resample, and encode. The orchestrator in
//! [`operations`](super::operations) only talks to this trait, so the pixel
//! library behind it can be swapped (and mocked in tests).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{Dimension, ResolvedSize};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Every way a single resize invocation can fail.
///
/// All variants are terminal for the invocation; nothing is retried.
#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("No width or height requested")]
    MissingDimension,
    #[error("Invalid {field}: {reason}")]
    InvalidDimension { field: Dimension, reason: String },
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Resample failed: {0}")]
    Resample(String),
    #[error("Cannot encode {format:?}: {reason}")]
    Encode { format: ImageFormat, reason: String },
}

impl ResizeError {
    /// Stable name of the error kind, used as the `type` of error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ResizeError::MissingDimension => "MissingDimension",
            ResizeError::InvalidDimension { .. } => "InvalidDimension",
            ResizeError::Decode(_) => "DecodeError",
            ResizeError::Resample(_) => "ResampleError",
            ResizeError::Encode { .. } => "EncodeError",
        }
    }

    /// True for failures caused by the request itself rather than the image.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ResizeError::MissingDimension | ResizeError::InvalidDimension { .. }
        )
    }
}

/// Short upper-case name for a format, e.g. `JPEG`.
pub fn format_name(format: ImageFormat) -> &'static str {
    format.extensions_str().first().map_or("UNKNOWN", |ext| match *ext {
        "jpg" => "JPEG",
        "png" => "PNG",
        "gif" => "GIF",
        "webp" => "WEBP",
        "tif" | "tiff" => "TIFF",
        "bmp" => "BMP",
        _ => "OTHER",
    })
}

/// A decoded pixel grid together with the format it was decoded from.
///
/// Owned by whichever stage currently holds it; stages take it by value.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub format: ImageFormat,
}

impl DecodedImage {
    pub fn new(pixels: DynamicImage, format: ImageFormat) -> Self {
        Self { pixels, format }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

/// Trait for image processing backends.
///
/// Implementations are built once per process and shared read-only between
/// concurrent invocations, hence the `Send + Sync` bound.
pub trait ImageBackend: Send + Sync {
    /// Decode raw bytes, detecting the format from the content.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, ResizeError>;

    /// Produce a new image of exactly `size`. The format tag is carried over.
    fn resample(&self, image: DecodedImage, size: ResolvedSize)
    -> Result<DecodedImage, ResizeError>;

    /// Encode in `format`. Never substitutes a different format.
    fn encode(&self, image: DecodedImage, format: ImageFormat) -> Result<Vec<u8>, ResizeError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching real codecs.
    /// Uses Mutex (not RefCell) so it is Sync like the real backend.
    pub struct MockBackend {
        pub native: (u32, u32),
        pub format: ImageFormat,
        pub fail: Option<FailAt>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailAt {
        Decode,
        Resample,
        Encode,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode { len: usize },
        Resample { width: u32, height: u32 },
        Encode { format: ImageFormat, width: u32, height: u32 },
    }

    impl MockBackend {
        pub fn new(native: (u32, u32), format: ImageFormat) -> Self {
            Self {
                native,
                format,
                fail: None,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(mut self, at: FailAt) -> Self {
            self.fail = Some(at);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    impl ImageBackend for MockBackend {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, ResizeError> {
            self.record(RecordedOp::Decode { len: bytes.len() });
            if self.fail == Some(FailAt::Decode) {
                return Err(ResizeError::Decode("mock decode failure".into()));
            }
            let (w, h) = self.native;
            Ok(DecodedImage::new(DynamicImage::new_rgb8(w, h), self.format))
        }

        fn resample(
            &self,
            image: DecodedImage,
            size: ResolvedSize,
        ) -> Result<DecodedImage, ResizeError> {
            self.record(RecordedOp::Resample {
                width: size.width,
                height: size.height,
            });
            if self.fail == Some(FailAt::Resample) {
                return Err(ResizeError::Resample("mock resample failure".into()));
            }
            Ok(DecodedImage::new(
                DynamicImage::new_rgb8(size.width, size.height),
                image.format,
            ))
        }

        fn encode(&self, image: DecodedImage, format: ImageFormat) -> Result<Vec<u8>, ResizeError> {
            self.record(RecordedOp::Encode {
                format,
                width: image.width(),
                height: image.height(),
            });
            if self.fail == Some(FailAt::Encode) {
                return Err(ResizeError::Encode {
                    format,
                    reason: "mock encode failure".into(),
                });
            }
            Ok(format!("{}:{}x{}", format_name(format), image.width(), image.height()).into_bytes())
        }
    }

    #[test]
    fn mock_records_decode_and_reports_native_size() {
        let backend = MockBackend::new((800, 600), ImageFormat::Png);
        let decoded = backend.decode(b"abc").unwrap();
        assert_eq!(decoded.dimensions(), (800, 600));
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode { len: 3 }]);
    }

    #[test]
    fn mock_resample_carries_format() {
        let backend = MockBackend::new((800, 600), ImageFormat::Gif);
        let decoded = backend.decode(b"x").unwrap();
        let resized = backend
            .resample(
                decoded,
                ResolvedSize {
                    width: 40,
                    height: 30,
                },
            )
            .unwrap();
        assert_eq!(resized.dimensions(), (40, 30));
        assert_eq!(resized.format, ImageFormat::Gif);
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(ResizeError::MissingDimension.kind(), "MissingDimension");
        assert_eq!(
            ResizeError::InvalidDimension {
                field: Dimension::Width,
                reason: "x".into()
            }
            .kind(),
            "InvalidDimension"
        );
        assert_eq!(ResizeError::Decode("x".into()).kind(), "DecodeError");
        assert_eq!(ResizeError::Resample("x".into()).kind(), "ResampleError");
        assert_eq!(
            ResizeError::Encode {
                format: ImageFormat::Png,
                reason: "x".into()
            }
            .kind(),
            "EncodeError"
        );
    }

    #[test]
    fn invalid_dimension_message_names_field() {
        let err = ResizeError::InvalidDimension {
            field: Dimension::Height,
            reason: "-3 is not positive".into(),
        };
        assert_eq!(err.to_string(), "Invalid height: -3 is not positive");
        assert!(err.is_request_error());
    }

    #[test]
    fn encode_message_names_format() {
        let err = ResizeError::Encode {
            format: ImageFormat::Avif,
            reason: "no encoder".into(),
        };
        assert_eq!(err.to_string(), "Cannot encode Avif: no encoder");
        let err = ResizeError::Encode {
            format: ImageFormat::Jpeg,
            reason: "boom".into(),
        };
        assert_eq!(err.to_string(), "Cannot encode Jpeg: boom");
    }

    #[test]
    fn format_names() {
        assert_eq!(format_name(ImageFormat::Jpeg), "JPEG");
        assert_eq!(format_name(ImageFormat::Png), "PNG");
        assert_eq!(format_name(ImageFormat::Tiff), "TIFF");
        assert_eq!(format_name(ImageFormat::WebP), "WEBP");
    }
}
