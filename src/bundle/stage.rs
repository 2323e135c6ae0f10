//! Staged output and atomic publication.
//!
//! Nothing is ever written at a final path directly: content is produced in a
//! hidden temporary location next to the destination and moved into place
//! with a rename, so a crash never leaves a truncated file at a cache-hit
//! path.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Hidden scratch directory inside the bundle directory.
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    pub fn new(bundle_dir: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(bundle_dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Scratch path for `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Move a staged file to `dest`. Both live on the same filesystem.
    pub fn publish(&self, staged: &Path, dest: &Path) -> io::Result<()> {
        fs::rename(staged, dest)
    }
}

/// Write `contents` to `dest` through a temp file and rename.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(".tmp-");
    // Same mode as `fs::write` (0666 minus umask) instead of owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("manifest.json");

        write_atomic(&dest, b"one").unwrap();
        write_atomic(&dest, b"two").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"two");
        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name() != "manifest.json")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_uses_regular_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain.json");
        let atomic = dir.path().join("manifest.json");
        fs::write(&plain, b"{}").unwrap();
        write_atomic(&atomic, b"{}").unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&atomic), mode(&plain));
    }

    #[test]
    fn test_staging_cleans_up_on_drop() {
        let dir = TempDir::new().unwrap();
        let scratch = {
            let staging = Staging::new(dir.path()).unwrap();
            fs::write(staging.path("x.css"), "x").unwrap();
            staging.dir().to_path_buf()
        };
        assert!(!scratch.exists());
    }

    #[test]
    fn test_publish_moves_file() {
        let dir = TempDir::new().unwrap();
        let staging = Staging::new(dir.path()).unwrap();
        let staged = staging.path("styles-abc.css");
        fs::write(&staged, "body{}").unwrap();

        let dest = dir.path().join("styles-abc.css");
        staging.publish(&staged, &dest).unwrap();

        assert!(!staged.exists());
        assert_eq!(fs::read_to_string(dest).unwrap(), "body{}");
    }
}
