//! `bundlewright serve`: build, watch and serve with live reload.

use std::net::IpAddr;

use anyhow::{Context, Result};
use bundlewright::config::PipelineConfig;
use bundlewright::reload::{ReloadServer, client_snippet};
use bundlewright::serve::StaticServer;
use bundlewright::{debug, log};

use super::common::{registry_from, runtime};

pub fn run(
    config: PipelineConfig,
    interface: Option<IpAddr>,
    port: Option<u16>,
    ws_port: Option<u16>,
    watch: Option<bool>,
) -> Result<()> {
    let interface = interface.unwrap_or(config.serve.interface);
    let port = port.unwrap_or(config.serve.port);
    let ws_port = ws_port.unwrap_or(config.serve.ws_port);
    let watch = watch.unwrap_or(true);

    let options = config.pipeline.clone().watch(watch);
    let bundle_dir = options.bundle_dir.clone();
    let prefix = options.url_prefix().to_string();

    let registry = registry_from(&config)?;
    let rt = runtime()?;
    rt.block_on(registry.initialize(options))?;

    let reload = if registry.is_watching() {
        let server = ReloadServer::start(registry.clone(), interface, ws_port)?;
        debug!("reload"; "client snippet:\n{}", client_snippet(server.port()));
        Some(server)
    } else {
        None
    };

    let server = StaticServer::bind(interface, port, bundle_dir, prefix)?;
    let handle = server.handle();
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        handle.unblock();
    })
    .context("failed to set Ctrl+C handler")?;

    server.run()?;

    if let Some(reload) = reload {
        reload.stop();
    }
    rt.block_on(registry.teardown());
    Ok(())
}
