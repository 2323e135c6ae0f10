//! `bundlewright show`

use anyhow::{Result, bail};
use bundlewright::config::PipelineConfig;

use super::common::{registry_from, runtime};

pub fn run(config: PipelineConfig, name: Option<&str>) -> Result<()> {
    let options = config.pipeline.clone().frozen(true).watch(false);
    let registry = registry_from(&config)?;
    let rt = runtime()?;
    rt.block_on(registry.initialize(options))?;

    let json = match name {
        Some(name) => match registry.get_component_bundles(name)? {
            Some(bundles) => serde_json::to_string_pretty(&bundles)?,
            None => bail!("no bundles for `{name}` in the manifest"),
        },
        None => registry.manifest()?.to_json()?,
    };
    println!("{}", json.trim_end());

    rt.block_on(registry.teardown());
    Ok(())
}
