//! # Simple Resize
//!
//! An on-demand image resizer. Give it an image and a target width, height,
//! or both; it hands back the image at that size in the format it came in.
//!
//! # Architecture: One Pipeline, Three Front Ends
//!
//! Every entry point funnels into the same pure pipeline in [`imaging`]:
//!
//! ```text
//! source bytes → decode → resolve size → resample → encode (same format) → bytes
//!                            │
//!                            └─ nothing requested → original bytes, untouched
//! ```
//!
//! The front ends only differ in where bytes come from and go to:
//!
//! - **HTTP** ([`server`]): `GET /resize?image_name=…&w=…&h=…`, sources fetched
//!   from a [`store::SourceStore`], work done on tokio's blocking pool.
//! - **Single file** ([`batch::resize_file`]): `simple-resize resize`.
//! - **Directory tree** ([`batch::run_batch`]): `simple-resize batch`, fanned
//!   out over a rayon pool.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Size resolution, the [`imaging::ImageBackend`] trait, the pure-Rust backend, the [`imaging::resize`] pipeline |
//! | [`store`] | Named source lookup; [`store::DirStore`] treats a directory as the bucket |
//! | [`server`] | axum router, JSON error mapping, ETag handling, graceful shutdown |
//! | [`batch`] | File and directory-tree resizing for the CLI |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Integer Aspect Math
//!
//! Deriving the missing side is done in integer arithmetic with
//! round-half-away-from-zero and a floor of one pixel, see
//! [`imaging::scale_edge`]. There is no float drift on large edges and the
//! same request always yields the same size.
//!
//! ## Format In, Format Out
//!
//! The output is encoded in whatever format the decoder sniffed from the
//! content, never from a file extension or a query parameter. A PNG asked for
//! at half width comes back as a PNG.
//!
//! ## One Backend Per Process
//!
//! Decoder limits, the output pixel cap and JPEG quality live in a single
//! [`imaging::RustBackend`] built from config at startup and shared by every
//! request. The trait seam exists so the pipeline can be tested against a
//! recording mock without touching codecs.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod server;
pub mod store;
