use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted audit preferences. Every field is optional; CLI flags win over
/// these, and the embedded constants fill whatever is left.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub base_url: Option<String>,
  pub concurrency: Option<usize>,
  pub timeout_secs: Option<u64>,
  pub user_agent: Option<String>,
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "lacuna")
}

pub fn config_path() -> Option<PathBuf> {
  project_dirs().map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  pub fn load() -> Self {
    config_path().map(|path| Self::load_from(&path)).unwrap_or_default()
  }

  /// Missing or malformed files give the defaults.
  pub fn load_from(path: &Path) -> Self {
    if let Ok(content) = std::fs::read_to_string(path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }

  pub fn save(&self) -> Result<PathBuf> {
    let path = config_path().context("No config directory available on this platform")?;
    self.save_to(&path)?;
    Ok(path)
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
  }

  /// Overlay `other`'s set fields onto `self`.
  pub fn merge(&mut self, other: Config) {
    if other.base_url.is_some() {
      self.base_url = other.base_url;
    }
    if other.concurrency.is_some() {
      self.concurrency = other.concurrency;
    }
    if other.timeout_secs.is_some() {
      self.timeout_secs = other.timeout_secs;
    }
    if other.user_agent.is_some() {
      self.user_agent = other.user_agent;
    }
  }
}
