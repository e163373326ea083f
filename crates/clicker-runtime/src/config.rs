use anyhow::{Context, Result};
use chrono::Duration;
use clicker_econ::EconomyConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Click deduplication windows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// A repeated request inside this window replays the stored result.
    pub freshness_ms: u64,
    /// Entries older than this are dropped.
    pub retention_secs: u64,
    /// Maximum number of remembered results.
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            freshness_ms: 2_000,
            retention_secs: 30,
            capacity: 100,
        }
    }
}

// Upper bound on configured windows (one year).
const MAX_WINDOW_SECS: u64 = 365 * 86_400;

impl DedupConfig {
    /// Replay window as a duration.
    pub fn freshness(&self) -> Duration {
        let ms = self.freshness_ms.min(MAX_WINDOW_SECS * 1_000);
        Duration::milliseconds(ms as i64)
    }

    /// Retention window as a duration.
    pub fn retention(&self) -> Duration {
        Duration::seconds(self.retention_secs.min(MAX_WINDOW_SECS) as i64)
    }
}

/// Full runtime configuration as read from YAML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Engine parameters.
    pub economy: EconomyConfig,
    /// Click deduplication windows.
    pub dedup: DedupConfig,
}

impl RuntimeConfig {
    /// Parse YAML and validate the economy section.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: RuntimeConfig = serde_yaml::from_str(text).context("parsing runtime config")?;
        cfg.economy
            .validate()
            .context("validating economy parameters")?;
        Ok(cfg)
    }
}

/// Read and validate a YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    RuntimeConfig::from_yaml_str(&text)
}
