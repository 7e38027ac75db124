//! Parameter types for resize operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the orchestrator in [`operations`](super::operations)
//! (which decides whether and how far to resize) and the
//! [`backend`](super::backend) (which does the actual pixel work).
//!
//! ## Types
//!
//! - [`SizeRequest`]: Caller-supplied optional width/height. Built once from untrusted input.
//! - [`ResolvedSize`]: Concrete output dimensions handed to the resampler.
//! - [`Resolution`]: Resolver outcome: pass the source through, or resize to a [`ResolvedSize`].
//! - [`EmptyRequestPolicy`]: What an empty [`SizeRequest`] means, process-wide.
//! - [`Quality`]: Lossy encoding quality (1-100, default 90). Clamped on construction.

use super::backend::ResizeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the image a size value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Height,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Width => f.write_str("width"),
            Dimension::Height => f.write_str("height"),
        }
    }
}

/// Optional target width and height.
///
/// Both absent means "no resize requested". A present `0` is invalid input,
/// never "unspecified"; the resolver rejects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl SizeRequest {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self { width, height }
    }

    pub fn width(width: u32) -> Self {
        Self::new(Some(width), None)
    }

    pub fn height(height: u32) -> Self {
        Self::new(None, Some(height))
    }

    pub fn exact(width: u32, height: u32) -> Self {
        Self::new(Some(width), Some(height))
    }

    /// Build a request from raw query-string values (`w`, `h`).
    ///
    /// Absent and empty values mean "not specified". Anything else must be a
    /// positive integer, otherwise the result is
    /// [`ResizeError::InvalidDimension`] naming the offending field.
    pub fn from_query(width: Option<&str>, height: Option<&str>) -> Result<Self, ResizeError> {
        Ok(Self {
            width: parse_dimension(Dimension::Width, width)?,
            height: parse_dimension(Dimension::Height, height)?,
        })
    }
}

fn parse_dimension(field: Dimension, raw: Option<&str>) -> Result<Option<u32>, ResizeError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };
    let value: i64 = raw.parse().map_err(|_| ResizeError::InvalidDimension {
        field,
        reason: format!("{raw:?} is not an integer"),
    })?;
    if value <= 0 {
        return Err(ResizeError::InvalidDimension {
            field,
            reason: format!("{value} is not positive"),
        });
    }
    u32::try_from(value)
        .map(Some)
        .map_err(|_| ResizeError::InvalidDimension {
            field,
            reason: format!("{value} is too large"),
        })
}

/// Concrete output dimensions. Both values are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedSize {
    pub width: u32,
    pub height: u32,
}

impl ResolvedSize {
    pub fn pixels(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for ResolvedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Outcome of dimension resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No resize requested: the source bytes are returned untouched.
    Unchanged,
    Resize(ResolvedSize),
}

/// How a request with neither width nor height is handled.
///
/// Configured once per process and applied to every caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyRequestPolicy {
    /// Return the original bytes unchanged.
    #[default]
    PassThrough,
    /// Fail with [`ResizeError::MissingDimension`].
    Reject,
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}
