//! High-level image operations.
//!
//! [`resize`] is the whole pipeline for one invocation:
//!
//! ```text
//! Decoding → Resolving ─┬─ (nothing requested) ───────────────→ Done (original bytes)
//!                       └→ Resampling → Encoding (input format) → Done
//! ```
//!
//! Any stage can fail; the first failure is returned as-is and nothing is
//! retried. No stage is revisited.

use super::backend::{ImageBackend, ResizeError};
use super::calculations::resolve_size;
use super::params::{EmptyRequestPolicy, Resolution, ResolvedSize, SizeRequest};
use image::ImageFormat;
use std::fmt;
use tracing::{debug, instrument};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ResizeError>;

/// Pipeline stage, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decoding,
    Resolving,
    Resampling,
    Encoding,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decoding => "decoding",
            Stage::Resolving => "resolving",
            Stage::Resampling => "resampling",
            Stage::Encoding => "encoding",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct Resized {
    pub bytes: Vec<u8>,
    /// Format detected at decode time; the output is always in this format.
    pub format: ImageFormat,
    /// Native dimensions of the source image.
    pub native: (u32, u32),
    /// Output dimensions, or `None` when the source was passed through.
    pub size: Option<ResolvedSize>,
}

impl Resized {
    pub fn is_pass_through(&self) -> bool {
        self.size.is_none()
    }
}

/// Resize `source` according to `request`, keeping the source format.
///
/// Decodes once, resolves the output size, resamples and encodes once. When
/// nothing is requested and `policy` passes through, the original bytes are
/// returned unchanged.
#[instrument(skip(backend, source), fields(source_len = source.len()))]
pub fn resize<B: ImageBackend + ?Sized>(
    backend: &B,
    source: &[u8],
    request: SizeRequest,
    policy: EmptyRequestPolicy,
) -> Result<Resized> {
    debug!(stage = %Stage::Decoding);
    let decoded = backend.decode(source)?;
    let native = decoded.dimensions();
    let format = decoded.format;

    debug!(stage = %Stage::Resolving, native_width = native.0, native_height = native.1);
    let size = match resolve_size(native, request, policy)? {
        Resolution::Unchanged => {
            debug!(stage = %Stage::Done, "no resize requested, passing source through");
            return Ok(Resized {
                bytes: source.to_vec(),
                format,
                native,
                size: None,
            });
        }
        Resolution::Resize(size) => size,
    };

    debug!(stage = %Stage::Resampling, %size);
    let resampled = backend.resample(decoded, size)?;

    debug!(stage = %Stage::Encoding, ?format);
    let bytes = backend.encode(resampled, format)?;

    debug!(stage = %Stage::Done, output_len = bytes.len());
    Ok(Resized {
        bytes,
        format,
        native,
        size: Some(size),
    })
}
