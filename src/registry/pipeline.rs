//! Initialized pipeline state: sandbox, builder, manifest and file index.
//!
//! A `Pipeline` is created by `Registry::initialize` and dropped by
//! `teardown`. Its component snapshot and index never change; only manifest
//! entries are patched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::RwLock;

use crate::bundle::BundleBuilder;
use crate::component::{Category, Component, ResolvedAssets};
use crate::config::PipelineOptions;
use crate::log;
use crate::manifest::{ComponentBundles, Manifest};
use crate::sandbox::{Rejection, Sandbox};
use crate::utils::normalize_path;
use crate::watch::WatchedFileIndex;

pub struct Pipeline {
    options: PipelineOptions,
    sandbox: Sandbox,
    builder: BundleBuilder,
    manifest: RwLock<Manifest>,
    components: BTreeMap<String, Component>,
    index: WatchedFileIndex,
    /// Serializes change batches from the watcher and `rebuild_changed`.
    rebuild: tokio::sync::Mutex<()>,
}

impl Pipeline {
    /// Load the persisted manifest verbatim. Nothing is built or indexed.
    pub fn load_frozen(options: PipelineOptions, components: BTreeMap<String, Component>) -> Self {
        let manifest = Manifest::load(&options.manifest_path());
        log!("manifest"; "loaded {} prebuilt entries", manifest.len());
        Self {
            sandbox: Sandbox::new(&options.static_root),
            builder: BundleBuilder::new(&options),
            manifest: RwLock::new(manifest),
            components,
            index: WatchedFileIndex::new(),
            rebuild: tokio::sync::Mutex::new(()),
            options,
        }
    }

    /// Resolve and index every component, force-build all bundles and
    /// persist the manifest.
    pub async fn build(
        options: PipelineOptions,
        components: BTreeMap<String, Component>,
    ) -> std::io::Result<Self> {
        let started = Instant::now();
        let sandbox = Sandbox::new(&options.static_root);
        let builder = BundleBuilder::new(&options);

        let mut index = WatchedFileIndex::new();
        let mut manifest = Manifest::default();
        for (name, component) in &components {
            let (assets, pending) = resolve_assets(&sandbox, component);
            index.insert(name, &assets);
            for path in pending {
                index.insert_path(name, path);
            }
            manifest.insert(name, builder.build_component(&assets).await);
        }

        let pipeline = Self {
            options,
            sandbox,
            builder,
            manifest: RwLock::new(manifest),
            components,
            index,
            rebuild: tokio::sync::Mutex::new(()),
        };
        pipeline.persist()?;

        log!(
            "bundle";
            "{} component(s), {} bundle(s) in {}ms",
            pipeline.components.len(),
            pipeline.bundle_count(),
            started.elapsed().as_millis()
        );
        Ok(pipeline)
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn is_frozen(&self) -> bool {
        self.options.frozen
    }

    /// Canonical static root.
    pub fn static_root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn index(&self) -> &WatchedFileIndex {
        &self.index
    }

    /// Distinct bundles produced or reused by this pipeline.
    pub fn bundle_count(&self) -> usize {
        self.builder.record_count()
    }

    pub fn bundles(&self, name: &str) -> Option<ComponentBundles> {
        self.manifest.read().get(name).cloned()
    }

    /// Snapshot of the current manifest.
    pub fn manifest(&self) -> Manifest {
        self.manifest.read().clone()
    }

    /// Rebuild every component that depends on one of `paths`, patch their
    /// manifest entries and persist once. Returns the affected names.
    ///
    /// Batches run one at a time, so a slower batch can never overwrite an
    /// entry with bundles of an older file state.
    pub async fn apply_changes(&self, paths: &[PathBuf]) -> Vec<String> {
        if self.is_frozen() {
            return Vec::new();
        }
        let _serial = self.rebuild.lock().await;

        let normalized: Vec<PathBuf> = paths.iter().map(|p| normalize_path(p)).collect();
        let affected = self.index.affected(&normalized);
        if affected.is_empty() {
            crate::debug!("watch"; "{} change(s), no component affected", paths.len());
            return Vec::new();
        }

        for name in &affected {
            let Some(component) = self.components.get(name) else {
                continue;
            };
            let (assets, _) = resolve_assets(&self.sandbox, component);
            let bundles = self.builder.build_component(&assets).await;
            self.manifest.write().insert(name.clone(), bundles);
        }

        if let Err(e) = self.persist() {
            log!("error"; "failed to persist manifest: {}", e);
        }
        affected.into_iter().collect()
    }

    fn persist(&self) -> std::io::Result<()> {
        let manifest = self.manifest.read().clone();
        manifest.save(&self.options.manifest_path())
    }
}

/// Sandbox every declared path of `component`.
///
/// Returns the accepted paths and, separately, the would-be locations of
/// declared files that are merely missing so they can be watched.
pub fn resolve_assets(sandbox: &Sandbox, component: &Component) -> (ResolvedAssets, Vec<PathBuf>) {
    let mut assets = ResolvedAssets::default();
    let mut pending = Vec::new();

    for category in Category::ALL {
        for declared in component.sources(category) {
            match sandbox.resolve(declared, category) {
                Ok(path) => {
                    assets.get_mut(category).insert(path);
                }
                Err(Rejection::NotFound) => {
                    log!("sandbox"; "{}: `{}` does not exist, skipping", component.name, declared);
                    pending.extend(sandbox.candidate(declared, category));
                }
                Err(reason) => {
                    log!("sandbox"; "{}: rejected `{}`: {}", component.name, declared, reason);
                }
            }
        }
    }

    (assets, pending)
}
