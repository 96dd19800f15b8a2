//! Body file loading.

use crate::error::RenderError;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Source of file-backed response bodies.
pub trait FileSource: Send + Sync {
    /// Read a file given by a path relative to the content root.
    fn read(&self, relative: &str) -> Result<Bytes, RenderError>;
}

/// Reads bodies from a directory on disk.
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    root: PathBuf,
}

impl FilesystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, RenderError> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RenderError::BodyFileOutsideRoot(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

impl FileSource for FilesystemSource {
    fn read(&self, relative: &str) -> Result<Bytes, RenderError> {
        let path = self.resolve(relative)?;
        match std::fs::read(&path) {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RenderError::BodyFileNotFound(path)),
            Err(source) => Err(RenderError::BodyFileUnreadable { path, source }),
        }
    }
}
