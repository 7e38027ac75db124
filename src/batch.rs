//! Offline resizing of files on disk.
//!
//! [`resize_file`] handles one file; [`run_batch`] walks a directory tree and
//! resizes every supported image in parallel on the global rayon pool,
//! mirroring the relative layout under the output directory.
//!
//! Per-file failures do not stop the batch. They are collected into the
//! [`BatchReport`] and the caller decides what to do with them.

use crate::imaging::{
    EmptyRequestPolicy, ImageBackend, ResizeError, Resized, SizeRequest, resize,
    supported_input_extensions,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Output directory {output} is inside input directory {input}")]
    OutputInsideInput { input: PathBuf, output: PathBuf },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Failure for a single file.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Resize(#[from] ResizeError),
}

/// Outcome for one file of a batch.
#[derive(Debug)]
pub struct FileReport {
    /// Path relative to the batch input directory.
    pub relative: PathBuf,
    pub result: Result<FileSummary, FileError>,
}

/// What a successful resize produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub native: (u32, u32),
    /// `None` when the file was copied through unchanged.
    pub output: Option<(u32, u32)>,
    pub format: image::ImageFormat,
    pub bytes_in: usize,
    pub bytes_out: usize,
}

impl FileSummary {
    fn from_resized(resized: &Resized, bytes_in: usize) -> Self {
        Self {
            native: resized.native,
            output: resized.size.map(|s| (s.width, s.height)),
            format: resized.format,
            bytes_in,
            bytes_out: resized.bytes.len(),
        }
    }
}

/// All file outcomes of a batch, ordered by relative path.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Resize one file and write the result to `output`.
///
/// Parent directories of `output` are created as needed. The output always
/// keeps the input's format, whatever extension `output` has.
pub fn resize_file<B: ImageBackend + ?Sized>(
    backend: &B,
    input: &Path,
    output: &Path,
    request: SizeRequest,
    policy: EmptyRequestPolicy,
) -> Result<FileSummary, FileError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| FileError::Io { path, source }
    };

    let source = std::fs::read(input).map_err(io_err(input))?;
    let resized = resize(backend, &source, request, policy)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    std::fs::write(output, &resized.bytes).map_err(io_err(output))?;

    Ok(FileSummary::from_resized(&resized, source.len()))
}

/// Relative paths of every supported image under `root`, sorted.
///
/// Extension matching is case-insensitive. Hidden files and directories
/// (leading `.`) are skipped.
pub fn collect_inputs(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !root.is_dir() {
        return Err(BatchError::NotADirectory(root.to_path_buf()));
    }
    let extensions = supported_input_extensions();

    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| extensions.contains(&e.as_str()));
        if !supported {
            debug!(path = %entry.path().display(), "skipping unsupported file");
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            found.push(relative.to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

/// Resize every supported image under `input_dir` into `output_dir`.
///
/// Runs on the current rayon pool; size it with
/// [`crate::config::effective_threads`] before calling.
pub fn run_batch<B: ImageBackend + ?Sized>(
    backend: &B,
    input_dir: &Path,
    output_dir: &Path,
    request: SizeRequest,
    policy: EmptyRequestPolicy,
) -> Result<BatchReport, BatchError> {
    if output_is_inside(input_dir, output_dir) {
        return Err(BatchError::OutputInsideInput {
            input: input_dir.to_path_buf(),
            output: output_dir.to_path_buf(),
        });
    }

    let inputs = collect_inputs(input_dir)?;
    info!(
        count = inputs.len(),
        input = %input_dir.display(),
        output = %output_dir.display(),
        "starting batch"
    );

    let files: Vec<FileReport> = inputs
        .into_par_iter()
        .map(|relative| {
            let result = resize_file(
                backend,
                &input_dir.join(&relative),
                &output_dir.join(&relative),
                request,
                policy,
            );
            if let Err(e) = &result {
                warn!(file = %relative.display(), "{e}");
            }
            FileReport { relative, result }
        })
        .collect();

    let report = BatchReport { files };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch finished"
    );
    Ok(report)
}

/// Whether `output` sits under `input`. Resized files would otherwise be
/// picked up by later walks of the same tree.
fn output_is_inside(input: &Path, output: &Path) -> bool {
    match (input.canonicalize(), canonicalize_lenient(output)) {
        (Ok(input), Some(output)) => output.starts_with(input),
        _ => false,
    }
}

/// Canonicalize the longest existing prefix of `path` and re-append the
/// components that do not exist yet.
fn canonicalize_lenient(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut cursor = path;
    loop {
        let existing = if cursor.as_os_str().is_empty() {
            Path::new(".")
        } else {
            cursor
        };
        if let Ok(mut resolved) = existing.canonicalize() {
            resolved.extend(missing.iter().rev().copied());
            return Some(resolved);
        }
        missing.push(cursor.file_name()?);
        cursor = cursor.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::{FailAt, MockBackend};
    use crate::imaging::rust_backend::tests::synthetic_image;
    use image::ImageFormat;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn collect_inputs_filters_by_extension() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.jpg", b"x");
        write(tmp.path(), "b.PNG", b"x");
        write(tmp.path(), "nested/c.webp", b"x");
        write(tmp.path(), "notes.txt", b"x");
        write(tmp.path(), "noext", b"x");
        write(tmp.path(), ".hidden/d.jpg", b"x");

        let found = collect_inputs(tmp.path()).unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a.jpg"),
                PathBuf::from("b.PNG"),
                PathBuf::from("nested/c.webp"),
            ]
        );
    }

    #[test]
    fn collect_inputs_rejects_file_root() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.jpg", b"x");
        assert!(matches!(
            collect_inputs(&tmp.path().join("a.jpg")),
            Err(BatchError::NotADirectory(_))
        ));
    }

    #[test]
    fn resize_file_writes_output_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "in.gif", b"source");
        let backend = MockBackend::new((1000, 500), ImageFormat::Gif);
        let out = tmp.path().join("deep/dir/out.gif");

        let summary = resize_file(
            &backend,
            &tmp.path().join("in.gif"),
            &out,
            SizeRequest::width(500),
            EmptyRequestPolicy::PassThrough,
        )
        .unwrap();

        assert_eq!(summary.native, (1000, 500));
        assert_eq!(summary.output, Some((500, 250)));
        assert_eq!(summary.bytes_in, 6);
        assert_eq!(std::fs::read(&out).unwrap(), b"GIF:500x250");
    }

    #[test]
    fn resize_file_pass_through_copies_bytes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "in.png", b"original bytes");
        let backend = MockBackend::new((10, 10), ImageFormat::Png);
        let out = tmp.path().join("out.png");

        let summary = resize_file(
            &backend,
            &tmp.path().join("in.png"),
            &out,
            SizeRequest::default(),
            EmptyRequestPolicy::PassThrough,
        )
        .unwrap();

        assert_eq!(summary.output, None);
        assert_eq!(std::fs::read(&out).unwrap(), b"original bytes");
    }

    #[test]
    fn resize_file_missing_input_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new((10, 10), ImageFormat::Png);
        let result = resize_file(
            &backend,
            &tmp.path().join("missing.png"),
            &tmp.path().join("out.png"),
            SizeRequest::width(5),
            EmptyRequestPolicy::PassThrough,
        );
        assert!(matches!(result, Err(FileError::Io { .. })));
        assert!(!tmp.path().join("out.png").exists());
    }

    #[test]
    fn batch_mirrors_layout() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write(input.path(), "a.jpg", b"1");
        write(input.path(), "sub/b.jpg", b"2");
        write(input.path(), "readme.md", b"skip");
        let backend = MockBackend::new((400, 200), ImageFormat::Jpeg);

        let report = run_batch(
            &backend,
            input.path(),
            output.path(),
            SizeRequest::height(100),
            EmptyRequestPolicy::PassThrough,
        )
        .unwrap();

        assert_eq!(report.files.len(), 2);
        assert!(report.is_success());
        assert_eq!(report.files[0].relative, PathBuf::from("a.jpg"));
        assert_eq!(report.files[1].relative, PathBuf::from("sub/b.jpg"));
        assert_eq!(
            std::fs::read(output.path().join("sub/b.jpg")).unwrap(),
            b"JPEG:200x100"
        );
        assert!(!output.path().join("readme.md").exists());
    }

    #[test]
    fn batch_collects_failures_per_file() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write(input.path(), "a.jpg", b"1");
        write(input.path(), "b.jpg", b"2");
        let backend = MockBackend::new((400, 200), ImageFormat::Jpeg).failing(FailAt::Decode);

        let report = run_batch(
            &backend,
            input.path(),
            output.path(),
            SizeRequest::width(10),
            EmptyRequestPolicy::PassThrough,
        )
        .unwrap();

        assert_eq!(report.failed(), 2);
        assert!(!report.is_success());
        assert!(report.files.iter().all(|f| matches!(
            f.result,
            Err(FileError::Resize(ResizeError::Decode(_)))
        )));
    }

    #[test]
    fn batch_refuses_output_inside_input() {
        let input = TempDir::new().unwrap();
        let nested = input.path().join("out");
        std::fs::create_dir_all(&nested).unwrap();
        let backend = MockBackend::new((1, 1), ImageFormat::Png);

        let result = run_batch(
            &backend,
            input.path(),
            &nested,
            SizeRequest::width(1),
            EmptyRequestPolicy::PassThrough,
        );
        assert!(matches!(result, Err(BatchError::OutputInsideInput { .. })));
    }

    #[test]
    fn batch_refuses_missing_output_inside_input() {
        let input = TempDir::new().unwrap();
        let backend = MockBackend::new((1, 1), ImageFormat::Png);

        let result = run_batch(
            &backend,
            input.path(),
            &input.path().join("small/nested"),
            SizeRequest::width(1),
            EmptyRequestPolicy::PassThrough,
        );
        assert!(matches!(result, Err(BatchError::OutputInsideInput { .. })));
    }

    #[test]
    fn canonicalize_lenient_keeps_missing_tail() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        assert_eq!(
            canonicalize_lenient(&tmp.path().join("a/b")),
            Some(root.join("a/b"))
        );
        assert_eq!(canonicalize_lenient(tmp.path()), Some(root));
    }

    #[test]
    fn batch_with_real_codecs() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write(input.path(), "wide.png", &synthetic_image(120, 60, ImageFormat::Png));
        write(input.path(), "broken.jpg", b"not a jpeg");

        let report = run_batch(
            &RustBackend::new(),
            input.path(),
            output.path(),
            SizeRequest::width(30),
            EmptyRequestPolicy::PassThrough,
        )
        .unwrap();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        let out = image::open(output.path().join("wide.png")).unwrap();
        assert_eq!((out.width(), out.height()), (30, 15));
    }
}
