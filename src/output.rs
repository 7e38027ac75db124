//! CLI output formatting for the `resize` and `batch` commands.
//!
//! # Output Format
//!
//! ## Resize
//!
//! ```text
//! photo.jpg
//!     Format: JPEG
//!     Size: 1000x500 → 500x250
//!     Bytes: 183.2 KB → 51.0 KB
//! ```
//!
//! A pass-through run shows `Size: 1000x500 (unchanged)`.
//!
//! ## Batch
//!
//! ```text
//! 001 a.jpg
//!     JPEG 1000x500 → 500x250
//! 002 sub/b.png
//!     FAILED: Decode failed: ...
//!
//! Resized 1 of 2 files, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::batch::{BatchReport, FileSummary};
use crate::imaging::format_name;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn format_dims((w, h): (u32, u32)) -> String {
    format!("{}x{}", w, h)
}

/// `1000x500 → 500x250`, or `1000x500 (unchanged)` for pass-through.
fn size_transition(summary: &FileSummary) -> String {
    match summary.output {
        Some(out) => format!("{} → {}", format_dims(summary.native), format_dims(out)),
        None => format!("{} (unchanged)", format_dims(summary.native)),
    }
}

// ============================================================================
// Resize
// ============================================================================

pub fn format_resize_output(input: &Path, summary: &FileSummary) -> Vec<String> {
    vec![
        input.display().to_string(),
        format!("{}Format: {}", indent(1), format_name(summary.format)),
        format!("{}Size: {}", indent(1), size_transition(summary)),
        format!(
            "{}Bytes: {} → {}",
            indent(1),
            format_bytes(summary.bytes_in),
            format_bytes(summary.bytes_out)
        ),
    ]
}

pub fn print_resize_output(input: &Path, summary: &FileSummary) {
    for line in format_resize_output(input, summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

pub fn format_batch_output(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, file) in report.files.iter().enumerate() {
        lines.push(format!(
            "{} {}",
            format_index(i + 1),
            file.relative.display()
        ));
        match &file.result {
            Ok(summary) => lines.push(format!(
                "{}{} {}",
                indent(1),
                format_name(summary.format),
                size_transition(summary)
            )),
            Err(e) => lines.push(format!("{}FAILED: {}", indent(1), e)),
        }
    }

    if !report.files.is_empty() {
        lines.push(String::new());
    }
    lines.push(format_batch_summary(report));
    lines
}

fn format_batch_summary(report: &BatchReport) -> String {
    let total = report.files.len();
    if total == 0 {
        return "No supported images found".to_string();
    }
    let noun = if total == 1 { "file" } else { "files" };
    match report.failed() {
        0 => format!("Resized {} {}", total, noun),
        failed => format!(
            "Resized {} of {} {}, {} failed",
            report.succeeded(),
            total,
            noun,
            failed
        ),
    }
}

pub fn print_batch_output(report: &BatchReport) {
    for line in format_batch_output(report) {
        println!("{}", line);
    }
}
