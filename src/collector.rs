//! Per-render asset collection and head markup.
//!
//! A render creates one [`AssetCollector`], adds every component it uses and
//! resolves once. URLs keep first-seen order and appear at most once per
//! category.

use rustc_hash::FxHashSet;

use crate::component::{Category, ComponentHandle};
use crate::error::RegistryError;
use crate::registry::Registry;
use crate::utils::html::escape_attr;

/// PyScript runtime loaded before any auxiliary script.
pub const PYSCRIPT_CORE: &str = "https://pyscript.net/releases/2024.11.1/core.js";

/// Insertion-ordered set of URLs.
#[derive(Debug, Clone, Default)]
struct UrlSet {
    order: Vec<String>,
    seen: FxHashSet<String>,
}

impl UrlSet {
    fn push(&mut self, url: &str) {
        if self.seen.insert(url.to_string()) {
            self.order.push(url.to_string());
        }
    }
}

pub struct AssetCollector {
    registry: Registry,
    css: UrlSet,
    js: UrlSet,
    py: UrlSet,
}

impl AssetCollector {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            css: UrlSet::default(),
            js: UrlSet::default(),
            py: UrlSet::default(),
        }
    }

    /// Add the bundles of `name`. Unknown names are ignored.
    pub fn add_by_name(&mut self, name: &str) -> Result<(), RegistryError> {
        let Some(bundles) = self.registry.get_component_bundles(name)? else {
            crate::debug!("collector"; "no bundles for `{}`", name);
            return Ok(());
        };
        for category in Category::ALL {
            if let Some(url) = bundles.get(category) {
                self.set_mut(category).push(url);
            }
        }
        Ok(())
    }

    pub fn add(&mut self, handle: &ComponentHandle) -> Result<(), RegistryError> {
        self.add_by_name(handle.name())
    }

    pub fn resolve(&self) -> ResolvedBundles {
        ResolvedBundles {
            css: self.css.order.clone(),
            js: self.js.order.clone(),
            py: self.py.order.clone(),
        }
    }

    fn set_mut(&mut self, category: Category) -> &mut UrlSet {
        match category {
            Category::Css => &mut self.css,
            Category::Js => &mut self.js,
            Category::Py => &mut self.py,
        }
    }
}

/// Bundle URLs a page needs, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBundles {
    pub css: Vec<String>,
    pub js: Vec<String>,
    pub py: Vec<String>,
}

impl ResolvedBundles {
    pub fn is_empty(&self) -> bool {
        self.css.is_empty() && self.js.is_empty() && self.py.is_empty()
    }

    /// `<head>` markup: stylesheets, deferred scripts, then the PyScript
    /// runtime and auxiliary scripts.
    pub fn to_head_html(&self) -> String {
        let mut lines = Vec::new();
        for url in &self.css {
            lines.push(format!(r#"<link rel="stylesheet" href="{}">"#, escape_attr(url)));
        }
        for url in &self.js {
            lines.push(format!(r#"<script src="{}" defer></script>"#, escape_attr(url)));
        }
        if !self.py.is_empty() {
            lines.push(format!(r#"<script type="module" src="{PYSCRIPT_CORE}"></script>"#));
            for url in &self.py {
                lines.push(format!(
                    r#"<script type="py" src="{}" async></script>"#,
                    escape_attr(url)
                ));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_html_order() {
        let bundles = ResolvedBundles {
            css: vec!["/b/styles-1.css".into()],
            js: vec!["/b/scripts-1.js".into()],
            py: vec!["/b/pyscripts-1.py".into()],
        };
        let html = bundles.to_head_html();
        let lines: Vec<_> = html.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"<link rel="stylesheet" href="/b/styles-1.css">"#,
                r#"<script src="/b/scripts-1.js" defer></script>"#,
                r#"<script type="module" src="https://pyscript.net/releases/2024.11.1/core.js"></script>"#,
                r#"<script type="py" src="/b/pyscripts-1.py" async></script>"#,
            ]
        );
    }

    #[test]
    fn test_head_html_without_py_skips_runtime() {
        let bundles = ResolvedBundles {
            css: vec!["/b/a\"b.css".into()],
            ..Default::default()
        };
        let html = bundles.to_head_html();
        assert_eq!(html, r#"<link rel="stylesheet" href="/b/a&quot;b.css">"#);
        assert!(!html.contains("pyscript"));
    }

    #[test]
    fn test_uninitialized_registry_propagates() {
        let mut collector = Registry::new().collector();
        assert!(matches!(
            collector.add_by_name("card"),
            Err(RegistryError::ManifestNotConfigured)
        ));
    }

    #[test]
    fn test_url_set_dedups_in_order() {
        let mut set = UrlSet::default();
        set.push("/b");
        set.push("/a");
        set.push("/b");
        assert_eq!(set.order, vec!["/b", "/a"]);
    }
}
