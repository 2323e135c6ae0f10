//! `[[components]]` declarations.
//!
//! # Example
//!
//! ```toml
//! [[components]]
//! name = "card"
//! styles = ["card.css"]
//! scripts = ["card.js"]
//!
//! [[components]]
//! name = "base"
//! layout = true
//! styles = ["css/app.css"]
//! pyscripts = ["py/main.py"]
//! ```

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKind};

/// A component declared in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDecl {
    pub name: String,
    pub layout: bool,
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
    pub pyscripts: Vec<String>,
}

impl ComponentDecl {
    pub fn to_component(&self) -> Component {
        let kind = if self.layout {
            ComponentKind::Layout
        } else {
            ComponentKind::Component
        };
        Component::new(&self.name, kind)
            .with_styles(self.styles.iter().cloned())
            .with_scripts(self.scripts.iter().cloned())
            .with_aux(self.pyscripts.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::component::{Category, ComponentKind};
    use crate::config::test_parse_config;

    #[test]
    fn test_components_parse() {
        let config = test_parse_config(
            r#"
[[components]]
name = "card"
styles = ["card.css"]
scripts = ["card.js"]

[[components]]
name = "base"
layout = true
pyscripts = ["main.py"]
"#,
        );

        assert_eq!(config.components.len(), 2);
        let card = config.components[0].to_component();
        assert_eq!(card.kind, ComponentKind::Component);
        assert!(card.sources(Category::Css).contains("card.css"));

        let base = config.components[1].to_component();
        assert_eq!(base.kind, ComponentKind::Layout);
        assert!(base.sources(Category::Py).contains("main.py"));
    }
}
