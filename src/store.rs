//! Source image store.
//!
//! The resize service fetches its input by name from an object store. The
//! [`SourceStore`] trait is that seam; [`DirStore`] is the implementation
//! shipped here, treating a local directory as the bucket and relative paths
//! inside it as object names.

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid image name: {0:?}")]
    InvalidName(String),
    #[error("Image not found: {0}")]
    NotFound(String),
    #[error("IO error reading {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Read access to source images, keyed by name.
pub trait SourceStore: Send + Sync {
    /// Fetch the full contents of the named object.
    fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

/// A directory acting as an object store.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object name to a path under the root.
    ///
    /// Only plain relative names are accepted: no `..`, no absolute paths,
    /// no drive prefixes. `.` components are skipped.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        let invalid = || StoreError::InvalidName(name.to_string());
        if name.trim().is_empty() {
            return Err(invalid());
        }

        let mut path = self.root.clone();
        let mut has_normal = false;
        for component in Path::new(name).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    has_normal = true;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid());
                }
            }
        }
        if !has_normal {
            return Err(invalid());
        }
        Ok(path)
    }
}

impl SourceStore for DirStore {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(name)?;
        if path.is_dir() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        std::fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::Io {
                name: name.to_string(),
                source,
            },
        })
    }
}
