use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sifter_core::{OllamaService, Pipeline, SifterConfig};

use super::read_bytes;

pub async fn run(
    path: &Path,
    config_path: Option<&Path>,
    model: Option<String>,
    compact: bool,
) -> Result<()> {
    let mut config = SifterConfig::load(config_path).context("failed to load configuration")?;
    if let Some(model) = model {
        config.service.model = model;
        config.validate().context("invalid configuration")?;
    }

    tracing::debug!(endpoint = %config.service.endpoint, model = %config.service.model, "using extraction service");
    let service = OllamaService::new(&config.service).context("failed to set up extraction service")?;
    let pipeline = Pipeline::new(Arc::new(service)).with_config(config.pipeline);

    let (bytes, filename) = read_bytes(path)?;
    let envelope = pipeline
        .parse_bytes(&bytes, &filename)
        .await
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let json = if compact {
        serde_json::to_string(&envelope)?
    } else {
        serde_json::to_string_pretty(&envelope)?
    };
    println!("{json}");

    Ok(())
}
