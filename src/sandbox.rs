//! Declared asset path validation against the static root.
//!
//! Checks run in a fixed order and the first violation wins:
//!
//! ```text
//! ..  →  hidden  →  extension  →  symlink  →  escape  →  exists  →  is file
//! ```
//!
//! Existence is checked late so a legitimately missing file is reported
//! differently from a traversal attempt.

use std::path::{Component as PathComponent, Path, PathBuf};

use thiserror::Error;

use crate::component::Category;

/// Why a declared path was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("contains a parent-directory segment")]
    ParentTraversal,

    #[error("segment `{0}` is hidden")]
    HiddenSegment(String),

    #[error("extension `{found}` is not allowed for {category} assets")]
    DisallowedExtension { found: String, category: Category },

    #[error("is a symlink")]
    Symlink,

    #[error("resolves outside the static root")]
    EscapesRoot,

    #[error("does not exist")]
    NotFound,

    #[error("is not a regular file")]
    NotAFile,
}

/// Static-root sandbox for declared asset paths.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    /// Canonical root, used for containment checks.
    canonical_root: PathBuf,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let canonical_root = root.canonicalize().unwrap_or_else(|_| root.clone());
        Self {
            root,
            canonical_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.canonical_root
    }

    /// Validate `declared` and return its canonical absolute path.
    pub fn resolve(&self, declared: &str, category: Category) -> Result<PathBuf, Rejection> {
        let relative = lexical_check(declared, category)?;
        let candidate = self.root.join(&relative);

        // Only the leaf is inspected: a symlinked parent directory is caught
        // by the containment check below.
        if candidate
            .symlink_metadata()
            .is_ok_and(|meta| meta.file_type().is_symlink())
        {
            return Err(Rejection::Symlink);
        }

        let resolved = match candidate.canonicalize() {
            Ok(resolved) => resolved,
            Err(_) => return Err(self.missing(&candidate)),
        };

        if !resolved.starts_with(&self.canonical_root) {
            return Err(Rejection::EscapesRoot);
        }

        if !resolved.is_file() {
            return Err(Rejection::NotAFile);
        }

        Ok(resolved)
    }

    /// Classify a path that cannot be canonicalized. Its deepest existing
    /// ancestor decides whether it would land outside the root.
    fn missing(&self, candidate: &Path) -> Rejection {
        let escapes = candidate
            .ancestors()
            .skip(1)
            .find_map(|ancestor| ancestor.canonicalize().ok())
            .is_some_and(|ancestor| !ancestor.starts_with(&self.canonical_root));
        if escapes {
            Rejection::EscapesRoot
        } else {
            Rejection::NotFound
        }
    }

    /// Where `declared` would live under the canonical root, if it passes the
    /// path-only checks. Used to watch for files that do not exist yet.
    pub fn candidate(&self, declared: &str, category: Category) -> Option<PathBuf> {
        lexical_check(declared, category)
            .ok()
            .map(|relative| self.canonical_root.join(relative))
    }
}

/// Path-only checks (no filesystem access). Returns the root-relative path.
fn lexical_check(declared: &str, category: Category) -> Result<PathBuf, Rejection> {
    let mut relative = PathBuf::new();

    for part in Path::new(declared).components() {
        match part {
            PathComponent::ParentDir => return Err(Rejection::ParentTraversal),
            // Declared paths are always root-relative
            PathComponent::Prefix(_) | PathComponent::RootDir | PathComponent::CurDir => {}
            PathComponent::Normal(segment) => relative.push(segment),
        }
    }

    for part in relative.components() {
        let segment = part.as_os_str().to_string_lossy();
        if segment.starts_with('.') {
            return Err(Rejection::HiddenSegment(segment.into_owned()));
        }
    }

    let ext = relative
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !category.allowed_extensions().contains(&ext.as_str()) {
        return Err(Rejection::DisallowedExtension {
            found: ext,
            category,
        });
    }

    Ok(relative)
}
