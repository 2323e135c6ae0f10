//! `bundlewright build`

use std::time::Instant;

use anyhow::Result;
use bundlewright::config::PipelineConfig;
use bundlewright::{Category, log};

use super::common::{registry_from, runtime};

pub fn run(config: PipelineConfig, minify: Option<bool>) -> Result<()> {
    let mut options = config.pipeline.clone().frozen(false).watch(false);
    if let Some(minify) = minify {
        options.bundler.minify = minify;
    }
    let manifest_path = options.manifest_path();

    let registry = registry_from(&config)?;
    let rt = runtime()?;
    let started = Instant::now();

    rt.block_on(async {
        registry.initialize(options).await?;
        let manifest = registry.manifest()?;
        for (name, bundles) in manifest.iter() {
            let urls: Vec<String> = Category::ALL
                .iter()
                .filter_map(|c| bundles.get(*c).map(|url| format!("{c}={url}")))
                .collect();
            if urls.is_empty() {
                log!("bundle"; "{}: no assets", name);
            } else {
                log!("bundle"; "{}: {}", name, urls.join(" "));
            }
        }
        registry.teardown().await;
        anyhow::Ok(())
    })?;

    log!(
        "build";
        "wrote {} in {}ms",
        manifest_path.display(),
        started.elapsed().as_millis()
    );
    Ok(())
}
