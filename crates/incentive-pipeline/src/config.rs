//! Pipeline settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default settings file, read from the working directory when present
pub const SETTINGS_FILE: &str = "incentive.toml";

/// Environment prefix; nested keys use `__`, e.g. `INCENTIVE__STORE__BACKEND`
pub const ENV_PREFIX: &str = "INCENTIVE";

/// Batch runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// JSON object of activity code to reward config
    pub activity_config_path: PathBuf,
    /// JSON array of `{activity_code, contracts}` batches
    pub input_path: PathBuf,
    /// Where to write records and summaries; stdout when unset
    pub output_path: Option<PathBuf>,
    pub store: StoreSettings,
    /// Activities processed in parallel
    pub max_concurrent_activities: usize,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            activity_config_path: PathBuf::from("activities.json"),
            input_path: PathBuf::from("contracts.json"),
            output_path: None,
            store: StoreSettings::default(),
            max_concurrent_activities: 4,
            log_filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_path: PathBuf::from("performance.db"),
        }
    }
}

impl PipelineSettings {
    /// Load from defaults, then `incentive.toml`, then `INCENTIVE__*` variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load_from(SETTINGS_FILE)
    }

    pub fn load_from(file: &str) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .context("failed to seed default settings")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to assemble settings")?;

        let loaded: Self = settings
            .try_deserialize()
            .context("failed to deserialize settings")?;
        loaded.check()?;
        Ok(loaded)
    }

    fn check(&self) -> Result<()> {
        if self.max_concurrent_activities == 0 {
            anyhow::bail!("max_concurrent_activities must be at least 1");
        }
        Ok(())
    }
}
