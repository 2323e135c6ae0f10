//! Request URL to bundle file resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Map `url` under `prefix` to a regular file inside `root`.
///
/// Anything that is not a plain file name path below the prefix (parent
/// segments, hidden segments, encoded separators that escape, symlinks out
/// of the root) resolves to `None`.
pub fn resolve_path(url: &str, prefix: &str, root: &Path) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;

    let decoded = percent_decode_str(rest).decode_utf8().ok()?;
    if decoded.is_empty() || decoded.contains(['\\', '\0']) {
        return None;
    }
    if decoded
        .split('/')
        .any(|segment| segment.is_empty() || segment == ".." || segment.starts_with('.'))
    {
        return None;
    }

    let canonical = root.join(decoded.as_ref()).canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) || !canonical.is_file() {
        return None;
    }
    Some(canonical)
}
