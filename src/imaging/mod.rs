//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` with content-sniffed format |
//! | **Resolve size** | [`resolve_size`] (pure, integer rounding) |
//! | **Resample** | `resize_exact` with `Lanczos3` |
//! | **Encode** | `image` encoders, always in the detected input format |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a resize request and its outcome
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: The [`resize`] pipeline combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{DecodedImage, ImageBackend, ResizeError, format_name};
pub use calculations::{resolve_size, scale_edge};
pub use operations::{Resized, Stage, resize};
pub use params::{Dimension, EmptyRequestPolicy, Quality, Resolution, ResolvedSize, SizeRequest};
pub use rust_backend::{BackendLimits, RustBackend, mime_type, supported_input_extensions};
