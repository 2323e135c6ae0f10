//! Deterministic fallback: ordered raw concatenation.

use std::fs;
use std::path::PathBuf;

use crate::component::Category;
use crate::log;

use super::minify;

/// Separator between concatenated inputs.
const JOIN: &str = "\n\n";

/// Concatenate readable inputs in order. `None` if nothing was readable.
pub fn concatenate<'a>(files: impl IntoIterator<Item = &'a PathBuf>) -> Option<String> {
    let mut parts = Vec::new();
    for path in files {
        match fs::read_to_string(path) {
            Ok(content) => parts.push(content),
            Err(e) => log!("bundle"; "skipping {}: {}", path.display(), e),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join(JOIN))
}

/// Concatenate, then optionally minify. Raw output is kept when minification
/// fails.
pub fn produce<'a>(
    files: impl IntoIterator<Item = &'a PathBuf>,
    category: Category,
    minify_output: bool,
) -> Option<String> {
    let raw = concatenate(files)?;
    if !minify_output {
        return Some(raw);
    }
    match minify::minify(category, &raw) {
        Some(min) => Some(min),
        None => {
            crate::debug!("bundle"; "{} fallback not minified, keeping raw output", category);
            Some(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_concatenate_joins_with_blank_line() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.css");
        let b = dir.path().join("b.css");
        fs::write(&a, "a{}").unwrap();
        fs::write(&b, "b{}").unwrap();

        let out = concatenate([&a, &b]).unwrap();
        assert_eq!(out, "a{}\n\nb{}");
    }

    #[test]
    fn test_concatenate_skips_unreadable() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.js");
        fs::write(&a, "let a;").unwrap();
        let missing = dir.path().join("gone.js");

        assert_eq!(concatenate([&missing, &a]).unwrap(), "let a;");
        assert!(concatenate([&missing]).is_none());
    }

    #[test]
    fn test_produce_keeps_raw_on_minify_failure() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.js");
        fs::write(&a, "function (").unwrap();

        let out = produce([&a], Category::Js, true).unwrap();
        assert_eq!(out, "function (");
    }
}
