//! Shared command setup.

use anyhow::{Context, Result};
use bundlewright::config::PipelineConfig;
use bundlewright::{Registry, log};

use super::Cli;

/// Load the config file named on the command line.
pub fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    PipelineConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))
}

/// Registry with every `[[components]]` entry registered.
pub fn registry_from(config: &PipelineConfig) -> Result<Registry> {
    let registry = Registry::new();
    for decl in &config.components {
        registry.register(decl.to_component())?;
    }
    if config.components.is_empty() {
        log!("warning"; "no [[components]] declared");
    }
    Ok(registry)
}

/// Multi-threaded runtime for the watcher and bundler subprocesses.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}
