use cadence_core::models::GeneratorConfig;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

pub const DEFAULT_CONFIG_PATH: &str = "cadence.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// SQLite database file
    pub database_path: String,
    /// Seconds between generation runs
    pub interval_secs: u64,
    /// Boards to generate for
    pub boards: Vec<Uuid>,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            interval_secs: 3600,
            boards: Vec::new(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Defaults, then the TOML file at `path` if it exists, then
    /// `CADENCE_*` variables (`__` separates nested keys, e.g.
    /// `CADENCE_GENERATOR__LOOKAHEAD_DAYS`).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(WorkerConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Rejects settings the worker cannot run with. Call after command-line
    /// overrides are applied.
    pub fn validate(&self) -> Result<()> {
        if self.boards.is_empty() {
            bail!("no boards configured; set `boards` in the configuration or pass --board");
        }
        if self.interval_secs == 0 {
            bail!("interval_secs must be greater than zero");
        }
        if self.generator.lookahead_days < 0 {
            bail!("generator.lookahead_days must not be negative");
        }
        Ok(())
    }
}
