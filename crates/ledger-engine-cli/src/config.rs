use anyhow::{Context, Result};
use ledger_engine::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Charges processed at once when `--concurrency` is not given.
    #[serde(default)]
    pub concurrency: Option<usize>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Config::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn find_and_load() -> Result<Option<(PathBuf, Self)>> {
        let config_locations = [
            Path::new("ledger-engine.toml"),
            Path::new(".ledger-engine.toml"),
        ];

        for location in &config_locations {
            if location.exists() {
                let config = Self::load_from_file(location)?;
                return Ok(Some((location.to_path_buf(), config)));
            }
        }

        Ok(None)
    }
}
