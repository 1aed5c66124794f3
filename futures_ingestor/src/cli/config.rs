use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{models::request_params::DEFAULT_PRICE_FIELD, providers::SourceSettings};

/// The parts of the pipeline config the ingestor needs. Other tables
/// (`[commodities.*]`, `[rates.*]`) are ignored here.
#[derive(Debug, Default, Deserialize)]
pub struct IngestorConfig {
    #[serde(default)]
    pub settings: IngestorSettings,
    #[serde(default)]
    pub source: SourceSettings,
}

#[derive(Debug, Deserialize)]
pub struct IngestorSettings {
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
}

impl Default for IngestorSettings {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from(".")
}

impl IngestorConfig {
    /// Reads and validates the config; a relative `data_root` is taken
    /// relative to the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg: IngestorConfig =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        cfg.source
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid [source] table")?;
        if cfg.settings.data_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            cfg.settings.data_root = base.join(&cfg.settings.data_root);
        }
        Ok(cfg)
    }

    /// Field requested when a CLI request does not name one.
    pub fn default_field(&self) -> &str {
        match &self.source {
            SourceSettings::Terminal(t) => &t.field,
            SourceSettings::Offline => DEFAULT_PRICE_FIELD,
        }
    }

    /// Volume field requested alongside prices, if the source reports volumes.
    pub fn volume_field(&self) -> Option<&str> {
        match &self.source {
            SourceSettings::Terminal(t) => t.volume_field(),
            SourceSettings::Offline => None,
        }
    }
}
