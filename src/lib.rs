//! Component asset pipeline.
//!
//! Components and layouts declare the stylesheets, scripts and auxiliary
//! scripts they need. On [`Registry::initialize`] every declared path is
//! sandboxed under the static root, each component's files are bundled into
//! content-addressed outputs and a manifest maps component names to bundle
//! URLs. In watch mode changed sources rebuild only the components that use
//! them and connected clients are told to reload.
//!
//! ```ignore
//! let registry = Registry::new();
//! let card = registry.register_component("card", ["card.css"], ["card.js"], [])?;
//! registry.initialize(PipelineOptions::default().watch(true)).await?;
//!
//! let mut collector = registry.collector();
//! collector.add(&card)?;
//! let head = collector.resolve().to_head_html();
//! ```

pub mod bundle;
pub mod collector;
pub mod component;
pub mod config;
pub mod error;
pub mod logger;
pub mod manifest;
pub mod registry;
pub mod reload;
pub mod sandbox;
pub mod serve;
pub mod utils;
pub mod watch;

pub use collector::{AssetCollector, ResolvedBundles};
pub use component::{Category, Component, ComponentHandle, ComponentKind, ResolvedAssets};
pub use config::{BundlerConfig, PipelineConfig, PipelineOptions};
pub use error::RegistryError;
pub use manifest::{ComponentBundles, Manifest};
pub use registry::Registry;
pub use reload::{ConnectionId, ReloadChannel, ReloadMessage};
pub use sandbox::{Rejection, Sandbox};
