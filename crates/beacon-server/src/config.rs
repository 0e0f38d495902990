use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use beacon_app::config::EngineConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_url() -> String {
    "sqlite://beacon.db".into()
}
fn default_max_connections() -> u32 {
    5
}

impl Config {
    /// Reads `path` if it exists. A missing file is only an error when the
    /// path was given explicitly.
    pub fn load(path: &Path, explicit: bool) -> anyhow::Result<Self> {
        if !path.exists() {
            if explicit {
                bail!("config file {} does not exist", path.display());
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("loading {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let db = &self.database;
        if db.url.trim().is_empty() {
            bail!("database.url must not be empty");
        }
        if db.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        if db.url.contains(":memory:") && db.max_connections != 1 {
            bail!("in-memory databases need database.max_connections = 1");
        }
        if self.engine.ingest.default_namespace.trim().is_empty() {
            bail!("ingest.default_namespace must not be empty");
        }
        Ok(())
    }
}
