//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::ResizeError;
use super::params::{Dimension, EmptyRequestPolicy, Resolution, ResolvedSize, SizeRequest};

/// Scale `edge` by `numerator / denominator`, rounding to the nearest integer
/// with ties away from zero. Never returns less than 1.
///
/// Uses exact 128-bit integer arithmetic so large native sizes don't pick up float
/// error on the derived edge.
///
/// # Examples
/// ```
/// # use simple_resize::imaging::scale_edge;
/// // 1000x500 at width 200 → height 100
/// assert_eq!(scale_edge(200, 500, 1000), 100);
///
/// // 3x2 at width 1 → 0.666.. rounds to 1
/// assert_eq!(scale_edge(1, 2, 3), 1);
/// ```
pub fn scale_edge(edge: u32, numerator: u32, denominator: u32) -> u32 {
    let num = 2 * u128::from(edge) * u128::from(numerator) + u128::from(denominator);
    let scaled = num / (2 * u128::from(denominator));
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Resolve the output dimensions for a request against the native size.
///
/// # Arguments
/// * `native` - Source image dimensions (width, height), both > 0
/// * `request` - Caller-supplied optional width/height
/// * `policy` - What to do when neither width nor height is given
///
/// # Returns
/// * [`Resolution::Unchanged`] when nothing was requested and the policy passes through
/// * [`Resolution::Resize`] with both edges ≥ 1 otherwise
///
/// # Rules
/// 1. Empty request → per `policy`
/// 2. A zero width or height → [`ResizeError::InvalidDimension`] (width checked first)
/// 3. Width only → height derived from the native aspect ratio
/// 4. Height only → width derived from the native aspect ratio
/// 5. Both → used as given, aspect ratio may change
pub fn resolve_size(
    native: (u32, u32),
    request: SizeRequest,
    policy: EmptyRequestPolicy,
) -> Result<Resolution, ResizeError> {
    let (native_w, native_h) = native;

    if request.width == Some(0) {
        return Err(zero_dimension(Dimension::Width));
    }
    if request.height == Some(0) {
        return Err(zero_dimension(Dimension::Height));
    }

    let size = match (request.width, request.height) {
        (Some(width), Some(height)) => ResolvedSize { width, height },
        (Some(width), None) => ResolvedSize {
            width,
            height: scale_edge(width, native_h, native_w),
        },
        (None, Some(height)) => ResolvedSize {
            width: scale_edge(height, native_w, native_h),
            height,
        },
        (None, None) => {
            return match policy {
                EmptyRequestPolicy::PassThrough => Ok(Resolution::Unchanged),
                EmptyRequestPolicy::Reject => Err(ResizeError::MissingDimension),
            };
        }
    };

    Ok(Resolution::Resize(size))
}

fn zero_dimension(field: Dimension) -> ResizeError {
    ResizeError::InvalidDimension {
        field,
        reason: "0 is not positive".to_string(),
    }
}
