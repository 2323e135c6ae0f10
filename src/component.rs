//! Component model: asset categories, declared sources and typed handles.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Asset category a source file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Css,
    Js,
    Py,
}

impl Category {
    /// All categories in manifest order.
    pub const ALL: [Category; 3] = [Category::Css, Category::Js, Category::Py];

    /// Bundle filename prefix (`styles-<hash>.css`).
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Css => "styles",
            Self::Js => "scripts",
            Self::Py => "pyscripts",
        }
    }

    /// Output extension, also the manifest key.
    pub const fn ext(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
            Self::Py => "py",
        }
    }

    /// Source extensions a declared path may carry.
    pub const fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Css => &["css"],
            Self::Js => &["js", "mjs"],
            Self::Py => &["py"],
        }
    }

    /// Whether the external bundler understands this category.
    pub const fn is_bundleable(self) -> bool {
        matches!(self, Self::Css | Self::Js)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}

/// Plain component or page layout. The pipeline treats both identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    #[default]
    Component,
    Layout,
}

/// A registered component and the asset paths it declares.
///
/// Paths are stored as declared (relative to the static root) and only
/// become filesystem paths after sandboxing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub style_sources: BTreeSet<String>,
    pub script_sources: BTreeSet<String>,
    pub aux_sources: BTreeSet<String>,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            style_sources: BTreeSet::new(),
            script_sources: BTreeSet::new(),
            aux_sources: BTreeSet::new(),
        }
    }

    pub fn with_styles<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.style_sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn with_scripts<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script_sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn with_aux<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aux_sources.extend(sources.into_iter().map(Into::into));
        self
    }

    /// Declared sources for one category.
    pub fn sources(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::Css => &self.style_sources,
            Category::Js => &self.script_sources,
            Category::Py => &self.aux_sources,
        }
    }

    pub fn handle(&self) -> ComponentHandle {
        ComponentHandle {
            name: Arc::from(self.name.as_str()),
            kind: self.kind,
        }
    }
}

/// Typed handle returned by registration.
///
/// Call sites hold this instead of probing for registration by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    name: Arc<str>,
    kind: ComponentKind,
}

impl ComponentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn is_layout(&self) -> bool {
        self.kind == ComponentKind::Layout
    }
}

/// Sandboxed absolute paths of one component, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub css: BTreeSet<PathBuf>,
    pub js: BTreeSet<PathBuf>,
    pub py: BTreeSet<PathBuf>,
}

impl ResolvedAssets {
    pub fn get(&self, category: Category) -> &BTreeSet<PathBuf> {
        match category {
            Category::Css => &self.css,
            Category::Js => &self.js,
            Category::Py => &self.py,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut BTreeSet<PathBuf> {
        match category {
            Category::Css => &mut self.css,
            Category::Js => &mut self.js,
            Category::Py => &mut self.py,
        }
    }

    /// Every resolved path across categories.
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.css.iter().chain(&self.js).chain(&self.py)
    }

    pub fn is_empty(&self) -> bool {
        self.css.is_empty() && self.js.is_empty() && self.py.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_naming() {
        assert_eq!(Category::Css.prefix(), "styles");
        assert_eq!(Category::Js.prefix(), "scripts");
        assert_eq!(Category::Py.prefix(), "pyscripts");
        assert_eq!(Category::Py.to_string(), "py");
        assert!(!Category::Py.is_bundleable());
    }

    #[test]
    fn test_component_builder_dedups_sources() {
        let comp = Component::new("card", ComponentKind::Component)
            .with_styles(["card.css", "card.css"])
            .with_scripts(["card.js"]);

        assert_eq!(comp.sources(Category::Css).len(), 1);
        assert_eq!(comp.sources(Category::Js).len(), 1);
        assert!(comp.sources(Category::Py).is_empty());
    }

    #[test]
    fn test_handle_carries_kind() {
        let handle = Component::new("base", ComponentKind::Layout).handle();
        assert_eq!(handle.name(), "base");
        assert!(handle.is_layout());
    }
}
