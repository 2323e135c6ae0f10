//! Pipeline configuration management for `bundlewright.toml`.
//!
//! # Sections
//!
//! | Section               | Purpose                                        |
//! |-----------------------|------------------------------------------------|
//! | `[pipeline]`          | Static root, bundle dir, public prefix, modes  |
//! | `[pipeline.bundler]`  | External bundler program, timeout, minify      |
//! | `[serve]`             | Development server (interface, ports)          |
//! | `[[components]]`      | Components and layouts with their assets       |

mod component;
mod error;
mod pipeline;
mod serve;

pub use component::ComponentDecl;
pub use error::ConfigError;
pub use pipeline::{BundlerConfig, ENV_BUNDLE_DIR, ENV_MINIFY, ENV_PREBUILT, PipelineOptions};
pub use serve::ServeConfig;

use crate::log;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "bundlewright.toml";

/// Root configuration structure representing bundlewright.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Pipeline paths and modes
    #[serde(default)]
    pub pipeline: PipelineOptions,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Declared components and layouts
    #[serde(default)]
    pub components: Vec<ComponentDecl>,
}

impl PipelineConfig {
    /// Load configuration from file path with unknown field detection.
    ///
    /// Relative paths are resolved against the config file's directory and
    /// `BUNDLEWRIGHT_*` environment overrides are applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.finalize(root);
        config.pipeline.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Anchor relative paths at the project root.
    fn finalize(&mut self, root: PathBuf) {
        let pipeline = &mut self.pipeline;
        if pipeline.static_root.is_relative() {
            pipeline.static_root = root.join(&pipeline.static_root);
        }
        if pipeline.bundle_dir.is_relative() {
            pipeline.bundle_dir = root.join(&pipeline.bundle_dir);
        }
        self.root = root;
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(decl) = self.components.iter().find(|c| c.name.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "component with styles {:?} has an empty name",
                decl.styles
            )));
        }
        if !self.pipeline.public_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "pipeline.public_prefix `{}` must start with `/`",
                self.pipeline.public_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> PipelineConfig {
    let (parsed, ignored) = PipelineConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
