use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::Path;

/// Cache tuning, loadable from the client's YAML config.
///
/// TTLs are per domain: observation data changes fastest (field entries
/// during visits), farm files slowest (producer dossiers).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Default TTL for entries written directly to the store, in seconds.
  pub store_ttl_secs: i64,
  pub observations_ttl_secs: i64,
  pub alerts_ttl_secs: i64,
  pub farm_files_ttl_secs: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      store_ttl_secs: 300,
      observations_ttl_secs: 120,
      alerts_ttl_secs: 300,
      farm_files_ttl_secs: 900,
    }
  }
}

impl CacheConfig {
  /// Load cache configuration from a YAML file.
  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: CacheConfig = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  pub fn store_ttl(&self) -> Duration {
    Duration::seconds(self.store_ttl_secs)
  }

  pub fn observations_ttl(&self) -> Duration {
    Duration::seconds(self.observations_ttl_secs)
  }

  pub fn alerts_ttl(&self) -> Duration {
    Duration::seconds(self.alerts_ttl_secs)
  }

  pub fn farm_files_ttl(&self) -> Duration {
    Duration::seconds(self.farm_files_ttl_secs)
  }
}
