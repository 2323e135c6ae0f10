//! Component registry and pipeline lifecycle.
//!
//! ```text
//!            register_*            initialize            teardown
//! (open) ─────────────────► (open) ──────────► (initialized) ──────► (open)
//!                                                   │
//!                                    watch ─► WatcherHandle + reload channels
//! ```
//!
//! The registry is an explicit context object: construct one, register
//! components, initialize it, then hand clones to whatever renders pages.

mod pipeline;

pub use pipeline::{Pipeline, resolve_assets};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::collector::AssetCollector;
use crate::component::{Component, ComponentHandle, ComponentKind};
use crate::config::PipelineOptions;
use crate::error::RegistryError;
use crate::log;
use crate::manifest::{ComponentBundles, Manifest};
use crate::reload::{Broadcaster, ConnectionId, ReloadChannel};
use crate::watch::{self, WatcherHandle};

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Default)]
struct Catalog {
    components: BTreeMap<String, Component>,
    /// Set while initialized; registration is rejected.
    closed: bool,
}

#[derive(Default)]
struct Inner {
    catalog: RwLock<Catalog>,
    pipeline: RwLock<Option<Arc<Pipeline>>>,
    watcher: Mutex<Option<WatcherHandle>>,
    broadcaster: Broadcaster,
    /// Serializes initialize and teardown.
    lifecycle: tokio::sync::Mutex<()>,
}

/// Catalog of components and layouts, owner of the manifest.
///
/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register (or replace) a component.
    pub fn register_component<S, I1, I2, I3>(
        &self,
        name: impl Into<String>,
        styles: I1,
        scripts: I2,
        aux: I3,
    ) -> Result<ComponentHandle>
    where
        S: Into<String>,
        I1: IntoIterator<Item = S>,
        I2: IntoIterator<Item = S>,
        I3: IntoIterator<Item = S>,
    {
        self.register(
            Component::new(name, ComponentKind::Component)
                .with_styles(styles)
                .with_scripts(scripts)
                .with_aux(aux),
        )
    }

    /// Register (or replace) a layout. Layouts bundle exactly like components.
    pub fn register_layout<S, I1, I2, I3>(
        &self,
        name: impl Into<String>,
        styles: I1,
        scripts: I2,
        aux: I3,
    ) -> Result<ComponentHandle>
    where
        S: Into<String>,
        I1: IntoIterator<Item = S>,
        I2: IntoIterator<Item = S>,
        I3: IntoIterator<Item = S>,
    {
        self.register(
            Component::new(name, ComponentKind::Layout)
                .with_styles(styles)
                .with_scripts(scripts)
                .with_aux(aux),
        )
    }

    /// Register a prepared component. Last registration under a name wins.
    pub fn register(&self, component: Component) -> Result<ComponentHandle> {
        let mut catalog = self.inner.catalog.write();
        if catalog.closed {
            return Err(RegistryError::RegistrationClosed {
                name: component.name,
            });
        }
        let handle = component.handle();
        if catalog
            .components
            .insert(component.name.clone(), component)
            .is_some()
        {
            crate::debug!("registry"; "replaced `{}`", handle.name());
        }
        Ok(handle)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Build (or load) the manifest and optionally start watching.
    pub async fn initialize(&self, options: PipelineOptions) -> Result<()> {
        let _guard = self.inner.lifecycle.lock().await;
        if self.inner.pipeline.read().is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }

        let components = {
            let mut catalog = self.inner.catalog.write();
            catalog.closed = true;
            catalog.components.clone()
        };

        let watch = options.watch && !options.frozen;
        if options.frozen && options.watch {
            log!("watch"; "frozen manifest, watching disabled");
        }

        let pipeline = if options.frozen {
            Pipeline::load_frozen(options, components)
        } else {
            match Pipeline::build(options, components).await {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    self.reopen();
                    return Err(e.into());
                }
            }
        };
        let pipeline = Arc::new(pipeline);

        if watch {
            match WatcherHandle::spawn(Arc::clone(&pipeline), self.inner.broadcaster.clone()) {
                Ok(handle) => *self.inner.watcher.lock() = Some(handle),
                Err(e) => {
                    self.reopen();
                    return Err(e.into());
                }
            }
        }

        *self.inner.pipeline.write() = Some(pipeline);
        Ok(())
    }

    /// Stop watching, drop reload channels and pipeline state. The component
    /// catalog is kept so the registry can be initialized again. Idempotent.
    pub async fn teardown(&self) {
        let _guard = self.inner.lifecycle.lock().await;

        let watcher = self.inner.watcher.lock().take();
        if let Some(watcher) = watcher {
            watcher.stop().await;
        }
        self.inner.broadcaster.clear();
        self.inner.pipeline.write().take();
        self.reopen();
    }

    /// Tear down and forget every registered component.
    pub async fn clear(&self) {
        self.teardown().await;
        self.inner.catalog.write().components.clear();
    }

    fn reopen(&self) {
        self.inner.catalog.write().closed = false;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Bundle URLs of `name`, or `None` for an unknown component.
    pub fn get_component_bundles(&self, name: &str) -> Result<Option<ComponentBundles>> {
        Ok(self.pipeline()?.bundles(name))
    }

    /// Snapshot of the current manifest.
    pub fn manifest(&self) -> Result<Manifest> {
        Ok(self.pipeline()?.manifest())
    }

    /// Run one change batch: rebuild affected components, persist, and
    /// broadcast a reload. Returns the affected component names.
    pub async fn rebuild_changed(&self, paths: &[PathBuf]) -> Result<Vec<String>> {
        let pipeline = self.pipeline()?;
        Ok(watch::process_batch(&pipeline, &self.inner.broadcaster, paths, None).await)
    }

    /// New per-render collector bound to this registry.
    pub fn collector(&self) -> AssetCollector {
        AssetCollector::new(self.clone())
    }

    pub fn components(&self) -> Vec<ComponentHandle> {
        self.handles(ComponentKind::Component)
    }

    pub fn layouts(&self) -> Vec<ComponentHandle> {
        self.handles(ComponentKind::Layout)
    }

    pub fn component(&self, name: &str) -> Option<Component> {
        self.inner.catalog.read().components.get(name).cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.pipeline.read().is_some()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.watcher.lock().is_some()
    }

    fn handles(&self, kind: ComponentKind) -> Vec<ComponentHandle> {
        self.inner
            .catalog
            .read()
            .components
            .values()
            .filter(|c| c.kind == kind)
            .map(Component::handle)
            .collect()
    }

    fn pipeline(&self) -> Result<Arc<Pipeline>> {
        self.inner
            .pipeline
            .read()
            .clone()
            .ok_or(RegistryError::ManifestNotConfigured)
    }

    // ========================================================================
    // Reload channels
    // ========================================================================

    /// Subscribe a reload channel. Only accepted while watching.
    pub fn connect(&self, channel: Box<dyn ReloadChannel>) -> Result<ConnectionId> {
        if !self.is_watching() {
            return Err(RegistryError::LiveReloadDisabled);
        }
        Ok(self.inner.broadcaster.register(channel))
    }

    /// Unsubscribe a reload channel. Returns whether it was connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.inner.broadcaster.unregister(id)
    }

    /// Number of connected reload channels.
    pub fn connections(&self) -> usize {
        self.inner.broadcaster.len()
    }

    pub(crate) fn reap_closed(&self) -> usize {
        self.inner.broadcaster.reap_closed()
    }
}
