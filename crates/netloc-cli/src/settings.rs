//! Layered configuration: an optional TOML file, overridden by `NETLOC__*`
//! environment variables (`NETLOC__ENGINE__CONCURRENCY=4`).

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use netloc_device::Credentials;
use netloc_engine::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store_path:  PathBuf,
  pub engine:      EngineConfig,
  /// Named credential sets. Devices without one use `default`.
  pub credentials: HashMap<String, Credentials>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:  PathBuf::from("netloc.db"),
      engine:      EngineConfig::default(),
      credentials: HashMap::new(),
    }
  }
}

pub fn load(path: &Path) -> anyhow::Result<Settings> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("NETLOC")
        .prefix_separator("__")
        .separator("__"),
    )
    .build()
    .context("failed to read configuration")?
    .try_deserialize()
    .context("failed to deserialise settings")
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
