//! Persisted component → bundle URL mapping.
//!
//! ```json
//! {
//!   "bundles": {
//!     "card": { "css": "/static/bundles/styles-3f2a9c01b7de.css", "js": null, "py": null }
//!   }
//! }
//! ```
//!
//! Entries are kept in a `BTreeMap` so equal manifests serialize to equal
//! bytes.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bundle::write_atomic;
use crate::component::Category;
use crate::log;

/// File name of the manifest inside the bundle directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Bundle URLs of one component. Missing categories serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentBundles {
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub js: Option<String>,
    #[serde(default)]
    pub py: Option<String>,
}

impl ComponentBundles {
    pub fn get(&self, category: Category) -> Option<&str> {
        match category {
            Category::Css => self.css.as_deref(),
            Category::Js => self.js.as_deref(),
            Category::Py => self.py.as_deref(),
        }
    }

    pub fn set(&mut self, category: Category, url: Option<String>) {
        let slot = match category {
            Category::Css => &mut self.css,
            Category::Js => &mut self.js,
            Category::Py => &mut self.py,
        };
        *slot = url;
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    bundles: BTreeMap<String, ComponentBundles>,
}

impl Manifest {
    /// Load leniently: a missing or malformed file yields an empty manifest.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                crate::debug!("manifest"; "no manifest at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                log!("manifest"; "ignoring malformed {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Persist atomically as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn get(&self, name: &str) -> Option<&ComponentBundles> {
        self.bundles.get(name)
    }

    /// Insert or replace one component's entry.
    pub fn insert(&mut self, name: impl Into<String>, bundles: ComponentBundles) {
        self.bundles.insert(name.into(), bundles);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ComponentBundles)> {
        self.bundles.iter()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
