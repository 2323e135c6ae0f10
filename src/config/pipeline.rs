//! `[pipeline]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [pipeline]
//! static_root = "static"             # Declared asset paths are relative to this
//! bundle_dir = "static/bundles"      # Bundles and manifest.json are written here
//! public_prefix = "/static/bundles"  # URL prefix the bundle directory is served under
//! frozen = false                     # Load manifest.json verbatim, never build
//! watch = false                      # Rebuild on change and push live reloads
//!
//! [pipeline.bundler]
//! program = "esbuild"
//! timeout_secs = 30
//! minify = true
//! fallback_minify = false
//! externals = ["*.png", "*.woff2"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment override for the bundle directory.
pub const ENV_BUNDLE_DIR: &str = "BUNDLEWRIGHT_BUNDLE_DIR";
/// `1` switches to frozen mode (prebuilt bundles).
pub const ENV_PREBUILT: &str = "BUNDLEWRIGHT_PREBUILT";
/// `0` disables bundler minification.
pub const ENV_MINIFY: &str = "BUNDLEWRIGHT_MINIFY";

/// Options consumed by [`Registry::initialize`](crate::Registry::initialize).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Load the manifest from disk and never build.
    pub frozen: bool,

    /// Watch the static root and rebuild affected bundles.
    pub watch: bool,

    /// Root every declared asset path is resolved against.
    pub static_root: PathBuf,

    /// Output directory for bundles and `manifest.json`.
    pub bundle_dir: PathBuf,

    /// Public URL prefix of `bundle_dir`.
    pub public_prefix: String,

    /// External bundler settings.
    pub bundler: BundlerConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            frozen: false,
            watch: false,
            static_root: PathBuf::from("static"),
            bundle_dir: PathBuf::from("static/bundles"),
            public_prefix: "/static/bundles".to_string(),
            bundler: BundlerConfig::default(),
        }
    }
}

impl PipelineOptions {
    pub fn new(
        static_root: impl Into<PathBuf>,
        bundle_dir: impl Into<PathBuf>,
        public_prefix: impl Into<String>,
    ) -> Self {
        Self {
            static_root: static_root.into(),
            bundle_dir: bundle_dir.into(),
            public_prefix: public_prefix.into(),
            ..Self::default()
        }
    }

    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn bundler(mut self, bundler: BundlerConfig) -> Self {
        self.bundler = bundler;
        self
    }

    /// Path of the persisted manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.bundle_dir.join(crate::manifest::MANIFEST_FILE)
    }

    /// Public prefix without a trailing slash.
    pub fn url_prefix(&self) -> &str {
        self.public_prefix.trim_end_matches('/')
    }

    /// Apply `BUNDLEWRIGHT_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_BUNDLE_DIR).filter(|v| !v.is_empty()) {
            self.bundle_dir = PathBuf::from(dir);
        }
        if let Some(prebuilt) = lookup(ENV_PREBUILT) {
            self.frozen = prebuilt == "1";
        }
        if let Some(minify) = lookup(ENV_MINIFY) {
            self.bundler.minify = minify == "1";
        }
    }
}

/// `[pipeline.bundler]` external bundler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Program name or path; looked up on `PATH`. Empty disables it.
    pub program: String,

    /// Kill the bundler after this many seconds and fall back.
    pub timeout_secs: u64,

    /// Pass `--minify` to the bundler.
    pub minify: bool,

    /// Minify fallback concatenations in-process.
    pub fallback_minify: bool,

    /// Globs left as external references (`--external:<glob>`).
    pub externals: Vec<String>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            program: "esbuild".to_string(),
            timeout_secs: 30,
            minify: true,
            fallback_minify: false,
            externals: ["*.png", "*.jpg", "*.gif", "*.svg", "*.woff", "*.woff2"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl BundlerConfig {
    /// Configuration that never spawns a subprocess.
    pub fn fallback_only() -> Self {
        Self {
            program: String::new(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_pipeline_defaults() {
        let config = test_parse_config("");
        let opts = &config.pipeline;

        assert!(!opts.frozen);
        assert!(!opts.watch);
        assert_eq!(opts.public_prefix, "/static/bundles");
        assert_eq!(opts.bundler.program, "esbuild");
        assert_eq!(opts.bundler.timeout_secs, 30);
        assert!(opts.bundler.minify);
    }

    #[test]
    fn test_pipeline_partial_override() {
        let config = test_parse_config(
            "[pipeline]\nwatch = true\npublic_prefix = \"/assets/\"\n\n[pipeline.bundler]\ntimeout_secs = 5",
        );

        assert!(config.pipeline.watch);
        assert_eq!(config.pipeline.url_prefix(), "/assets");
        assert_eq!(config.pipeline.bundler.timeout(), Duration::from_secs(5));
        // untouched fields keep defaults
        assert_eq!(config.pipeline.bundler.program, "esbuild");
    }

    #[test]
    fn test_env_overrides() {
        let env: FxHashMap<&str, &str> = [
            (ENV_BUNDLE_DIR, "/tmp/out"),
            (ENV_PREBUILT, "1"),
            (ENV_MINIFY, "0"),
        ]
        .into_iter()
        .collect();

        let mut opts = PipelineOptions::default();
        opts.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert!(opts.frozen);
        assert!(!opts.bundler.minify);
        assert_eq!(opts.bundle_dir, PathBuf::from("/tmp/out"));
        assert_eq!(opts.manifest_path(), PathBuf::from("/tmp/out/manifest.json"));
    }

    #[test]
    fn test_env_absent_keeps_values() {
        let mut opts = PipelineOptions::default().frozen(true);
        opts.apply_env_from(|_| None);
        assert!(opts.frozen);
        assert_eq!(opts.bundle_dir, PathBuf::from("static/bundles"));
    }
}
