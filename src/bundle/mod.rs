//! Content-addressed bundle production.
//!
//! ```text
//! files ─► stamp (path, mtime) ─► fingerprint ─► {prefix}-{hash}.{ext}
//!                                                   │
//!                          exists? ── yes ──────────┴─► url
//!                             │
//!                             no ─► external bundler ─┬─► staged ─► rename ─► url
//!                                         │ failed    │
//!                                         └─► concat ─┘
//! ```

mod external;
mod fallback;
mod fingerprint;
mod minify;
mod stage;

pub use external::ExternalBundler;
pub use fingerprint::{FINGERPRINT_LEN, FileStamp, bundle_filename, fingerprint, stamp_files};
pub use stage::write_atomic;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use dashmap::DashMap;

use crate::component::{Category, ResolvedAssets};
use crate::config::PipelineOptions;
use crate::log;
use crate::manifest::ComponentBundles;
use stage::Staging;

/// A produced bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRecord {
    pub category: Category,
    pub filename: String,
    pub url: String,
}

/// Builds bundles into the bundle directory and memoizes the results.
pub struct BundleBuilder {
    bundle_dir: PathBuf,
    url_prefix: String,
    external: Option<ExternalBundler>,
    fallback_minify: bool,
    /// Records by output filename.
    records: DashMap<String, BundleRecord>,
}

impl BundleBuilder {
    pub fn new(options: &PipelineOptions) -> Self {
        Self {
            bundle_dir: options.bundle_dir.clone(),
            url_prefix: options.url_prefix().to_string(),
            external: ExternalBundler::locate(&options.bundler),
            fallback_minify: options.bundler.fallback_minify,
            records: DashMap::new(),
        }
    }

    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    /// Whether an external bundler was found.
    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    /// Number of bundles produced or reused by this builder.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Produce (or reuse) the bundle for `files` and return its public URL.
    ///
    /// Returns `None` when there is nothing to bundle or every strategy
    /// failed; failures are logged, never raised.
    pub async fn build(&self, files: &BTreeSet<PathBuf>, category: Category) -> Option<String> {
        if files.is_empty() {
            return None;
        }

        let stamps = stamp_files(files);
        if stamps.is_empty() {
            return None;
        }

        let filename = bundle_filename(category, &fingerprint(&stamps));
        let dest = self.bundle_dir.join(&filename);

        if dest.is_file() {
            crate::debug!("bundle"; "cached {}", filename);
            return Some(self.record(category, filename).url);
        }

        let inputs: Vec<&PathBuf> = stamps.iter().map(|s| &s.path).collect();
        let started = Instant::now();
        match self.produce(&inputs, category, &dest).await {
            Ok(true) => {
                log!("bundle"; "{} ({} files) in {}ms", filename, inputs.len(), started.elapsed().as_millis());
                Some(self.record(category, filename).url)
            }
            Ok(false) => None,
            Err(e) => {
                log!("error"; "bundling {} failed: {:#}", filename, e);
                None
            }
        }
    }

    /// Build every category of a component.
    pub async fn build_component(&self, assets: &ResolvedAssets) -> ComponentBundles {
        let mut bundles = ComponentBundles::default();
        for category in Category::ALL {
            let url = self.build(assets.get(category), category).await;
            bundles.set(category, url);
        }
        bundles
    }

    /// Write the bundle for `inputs` to `dest`. `Ok(false)` when no input
    /// was readable.
    async fn produce(&self, inputs: &[&PathBuf], category: Category, dest: &Path) -> Result<bool> {
        fs::create_dir_all(&self.bundle_dir)
            .with_context(|| format!("failed to create {}", self.bundle_dir.display()))?;
        let staging = Staging::new(&self.bundle_dir).context("failed to create staging dir")?;
        let staged = staging.path(&format!("out.{}", category.ext()));

        if category.is_bundleable()
            && let Some(external) = &self.external
        {
            match external.run(inputs, category, staging.dir(), &staged).await {
                Ok(()) => {
                    staging.publish(&staged, dest)?;
                    return Ok(true);
                }
                Err(e) => log!("bundle"; "{:#}, falling back to concatenation", e),
            }
        }

        let Some(content) =
            fallback::produce(inputs.iter().copied(), category, self.fallback_minify)
        else {
            return Ok(false);
        };
        fs::write(&staged, content)
            .with_context(|| format!("failed to write {}", staged.display()))?;
        staging.publish(&staged, dest)?;
        Ok(true)
    }

    fn record(&self, category: Category, filename: String) -> BundleRecord {
        self.records
            .entry(filename.clone())
            .or_insert_with(|| BundleRecord {
                category,
                url: format!("{}/{}", self.url_prefix, filename),
                filename,
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BundlerConfig;
    use tempfile::TempDir;

    fn options(dir: &Path, bundler: BundlerConfig) -> PipelineOptions {
        PipelineOptions::new(
            dir.join("static"),
            dir.join("static/bundles"),
            "/static/bundles",
        )
        .bundler(bundler)
    }

    fn setup() -> (TempDir, BTreeSet<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("static");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.css"), ".a{color:red}").unwrap();
        fs::write(root.join("b.css"), ".b{color:blue}").unwrap();
        let files = [root.join("a.css"), root.join("b.css")]
            .into_iter()
            .collect();
        (dir, files)
    }

    #[tokio::test]
    async fn test_empty_input_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let builder = BundleBuilder::new(&options(dir.path(), BundlerConfig::fallback_only()));

        assert!(builder.build(&BTreeSet::new(), Category::Css).await.is_none());
        assert!(!dir.path().join("static/bundles").exists());
    }

    #[tokio::test]
    async fn test_all_unreadable_returns_none() {
        let dir = TempDir::new().unwrap();
        let builder = BundleBuilder::new(&options(dir.path(), BundlerConfig::fallback_only()));
        let files = [dir.path().join("gone.css")].into_iter().collect();

        assert!(builder.build(&files, Category::Css).await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_build_and_cache_hit() {
        let (dir, files) = setup();
        let builder = BundleBuilder::new(&options(dir.path(), BundlerConfig::fallback_only()));

        let url = builder.build(&files, Category::Css).await.unwrap();
        assert!(url.starts_with("/static/bundles/styles-"));
        assert!(url.ends_with(".css"));

        let filename = url.rsplit('/').next().unwrap();
        let dest = dir.path().join("static/bundles").join(filename);
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            ".a{color:red}\n\n.b{color:blue}"
        );

        // Second build hits the on-disk cache even with a fresh builder
        let modified = fs::metadata(&dest).unwrap().modified().unwrap();
        let again = BundleBuilder::new(&options(dir.path(), BundlerConfig::fallback_only()));
        assert_eq!(again.build(&files, Category::Css).await.unwrap(), url);
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), modified);
    }

    #[tokio::test]
    async fn test_no_staging_leftovers() {
        let (dir, files) = setup();
        let builder = BundleBuilder::new(&options(dir.path(), BundlerConfig::fallback_only()));
        builder.build(&files, Category::Css).await.unwrap();

        let hidden: Vec<_> = fs::read_dir(dir.path().join("static/bundles"))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(hidden.is_empty());
    }

    #[tokio::test]
    async fn test_missing_bundler_falls_back() {
        let (dir, files) = setup();
        let bundler = BundlerConfig {
            program: "bundlewright-no-such-bundler".into(),
            ..BundlerConfig::default()
        };
        let builder = BundleBuilder::new(&options(dir.path(), bundler));
        assert!(!builder.has_external());
        assert!(builder.build(&files, Category::Css).await.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_and_fallback_agree_on_filename() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, files) = setup();
        let script = dir.path().join("fake-bundler");
        fs::write(
            &script,
            "#!/bin/sh\nfor a in \"$@\"; do case \"$a\" in --outfile=*) out=\"${a#--outfile=}\";; esac; done\necho '/* bundled */' > \"$out\"\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let external_dir = TempDir::new().unwrap();
        let external_opts = PipelineOptions::new(
            dir.path().join("static"),
            external_dir.path().to_path_buf(),
            "/static/bundles",
        )
        .bundler(BundlerConfig {
            program: script.display().to_string(),
            ..BundlerConfig::default()
        });
        let external = BundleBuilder::new(&external_opts);
        assert!(external.has_external());

        let fallback = BundleBuilder::new(&options(dir.path(), BundlerConfig::fallback_only()));

        let a = external.build(&files, Category::Css).await.unwrap();
        let b = fallback.build(&files, Category::Css).await.unwrap();
        assert_eq!(a, b);

        let filename = a.rsplit('/').next().unwrap();
        let produced = fs::read_to_string(external_dir.path().join(filename)).unwrap();
        assert!(produced.contains("bundled"));
    }

    #[tokio::test]
    async fn test_py_always_concatenated() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("static");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("main.py"), "print('a')").unwrap();
        let files = [root.join("main.py")].into_iter().collect();

        let builder = BundleBuilder::new(&options(dir.path(), BundlerConfig::default()));
        let url = builder.build(&files, Category::Py).await.unwrap();
        assert!(url.starts_with("/static/bundles/pyscripts-"));
        assert!(url.ends_with(".py"));
        assert_eq!(builder.record_count(), 1);
    }
}
