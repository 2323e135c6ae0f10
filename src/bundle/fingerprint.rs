//! Bundle fingerprints from file paths and modification times.
//!
//! The fingerprint is the only cache key: an input file whose mtime moves
//! produces a new filename, an untouched set always maps to the same one.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::component::Category;

/// Hex characters of the blake3 digest kept in filenames.
pub const FINGERPRINT_LEN: usize = 12;

/// An input file with its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub path: PathBuf,
    /// Nanoseconds since the Unix epoch.
    pub mtime: u128,
}

impl FileStamp {
    /// Stamp `path`, or `None` if its metadata cannot be read.
    pub fn read(path: &Path) -> Option<Self> {
        let modified = path.metadata().and_then(|m| m.modified()).ok()?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Some(Self {
            path: path.to_path_buf(),
            mtime,
        })
    }

    fn token(&self) -> String {
        format!("{}-{}", self.path.display(), self.mtime)
    }
}

/// Stamp every readable file, skipping the rest.
pub fn stamp_files<'a>(files: impl IntoIterator<Item = &'a PathBuf>) -> Vec<FileStamp> {
    let mut stamps = Vec::new();
    for path in files {
        match FileStamp::read(path) {
            Some(stamp) => stamps.push(stamp),
            None => crate::debug!("bundle"; "skipping unreadable {}", path.display()),
        }
    }
    stamps
}

/// Short hex digest over sorted `path-mtime` tokens.
pub fn fingerprint(stamps: &[FileStamp]) -> String {
    let mut tokens: Vec<String> = stamps.iter().map(FileStamp::token).collect();
    tokens.sort();

    let digest = blake3::hash(tokens.join(":").as_bytes());
    let mut hex = hex::encode(digest.as_bytes());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// `{prefix}-{fingerprint}.{ext}`
pub fn bundle_filename(category: Category, fingerprint: &str) -> String {
    format!("{}-{}.{}", category.prefix(), fingerprint, category.ext())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(path: &str, mtime: u128) -> FileStamp {
        FileStamp {
            path: PathBuf::from(path),
            mtime,
        }
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = fingerprint(&[stamp("/s/a.css", 1), stamp("/s/b.css", 2)]);
        let b = fingerprint(&[stamp("/s/b.css", 2), stamp("/s/a.css", 1)]);
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_tracks_mtime() {
        let before = fingerprint(&[stamp("/s/a.css", 1)]);
        let after = fingerprint(&[stamp("/s/a.css", 2)]);
        assert_ne!(before, after);
    }

    #[test]
    fn test_bundle_filename_shape() {
        assert_eq!(
            bundle_filename(Category::Css, "0123456789ab"),
            "styles-0123456789ab.css"
        );
        assert_eq!(
            bundle_filename(Category::Py, "0123456789ab"),
            "pyscripts-0123456789ab.py"
        );
    }

    #[test]
    fn test_stamp_missing_file_skipped() {
        let files = vec![PathBuf::from("/nonexistent/a.css")];
        assert!(stamp_files(&files).is_empty());
    }
}
