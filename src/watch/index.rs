//! Inverted index from source file to the components that include it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::component::ResolvedAssets;

#[derive(Debug, Default)]
pub struct WatchedFileIndex {
    files: FxHashMap<PathBuf, BTreeSet<String>>,
}

impl WatchedFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every resolved path of `component`.
    pub fn insert(&mut self, component: &str, assets: &ResolvedAssets) {
        for path in assets.iter() {
            self.files
                .entry(path.clone())
                .or_default()
                .insert(component.to_string());
        }
    }

    /// Record a single path, e.g. a declared file that does not exist yet.
    pub fn insert_path(&mut self, component: &str, path: PathBuf) {
        self.files
            .entry(path)
            .or_default()
            .insert(component.to_string());
    }

    /// Components depending on `path`.
    pub fn components_for(&self, path: &Path) -> Option<&BTreeSet<String>> {
        self.files.get(path)
    }

    /// Union of components affected by any of `paths`, in name order.
    pub fn affected<'a>(&self, paths: impl IntoIterator<Item = &'a PathBuf>) -> BTreeSet<String> {
        let mut affected = BTreeSet::new();
        for path in paths {
            if let Some(names) = self.files.get(path) {
                affected.extend(names.iter().cloned());
            }
        }
        affected
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
