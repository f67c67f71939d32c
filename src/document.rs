//! File boundary: one read in, one atomic write out.
//!
//! The patch core is pure; this module is the only place the tool touches
//! disk. A document is read in full, transformed in memory, and written back
//! in full only when a transform succeeded. A failed run never leaves a
//! partial write behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A document loaded from disk, carrying its origin path so it can be
/// persisted back to the same location.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    content: String,
}

impl Document {
    /// Read a document in full.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let path = path.into();
        let content = fs::read_to_string(&path).map_err(|source| DocumentError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, content })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the in-memory content with a transformed version.
    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    /// Persist the current content back to the origin path atomically.
    pub fn write_back(&self) -> Result<(), DocumentError> {
        atomic_write(&self.path, self.content.as_bytes()).map_err(|source| {
            DocumentError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the original file is untouched. The
/// tempfile lives in the target's directory so the rename stays on one
/// filesystem.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), std::io::Error> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    // Bump mtime so file watchers and dev servers notice the change
    filetime::set_file_mtime(path, filetime::FileTime::now())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_transform_write_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("Chart.tsx");
        fs::write(&file_path, "original content").unwrap();

        let mut doc = Document::read(&file_path).unwrap();
        assert_eq!(doc.content(), "original content");

        doc.set_content("patched content".to_string());
        doc.write_back().unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "patched content");
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = Document::read(temp_dir.path().join("missing.tsx"));
        assert!(matches!(result, Err(DocumentError::Read { .. })));
    }

    #[test]
    fn test_unwritten_transform_leaves_file_untouched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("Chart.tsx");
        fs::write(&file_path, "original content").unwrap();

        let mut doc = Document::read(&file_path).unwrap();
        doc.set_content("never persisted".to_string());
        drop(doc);

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "original content");
    }
}
