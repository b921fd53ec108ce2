//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod validate;

use std::path::Path;

use fatura_core::FaturaConfig;

/// Load the pipeline configuration, overlaying the API key from the
/// environment when present.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FaturaConfig> {
    let mut config = if let Some(path) = config_path {
        FaturaConfig::from_file(Path::new(path))?
    } else {
        FaturaConfig::default()
    };

    if let Ok(key) = std::env::var("FATURA_API_KEY") {
        config.service.api_key = key;
    }

    Ok(config)
}
