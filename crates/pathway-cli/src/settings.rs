//! Layered runtime settings: defaults, then the TOML file, then `PATHWAY_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use pathway_core::config::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path: PathBuf,
  /// Curriculum tables and the streak timezone.
  pub engine:     EngineConfig,
}

impl Default for Settings {
  fn default() -> Self {
    Self { store_path: PathBuf::from("pathway.db"), engine: EngineConfig::default() }
  }
}

impl Settings {
  /// Read `path` if it exists, then apply the environment, e.g.
  /// `PATHWAY_STORE_PATH` or `PATHWAY_ENGINE__UTC_OFFSET_MINUTES`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let builder = Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(
        Environment::with_prefix("PATHWAY")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      );
    let mut settings = Self::from_builder(builder)?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    builder
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
