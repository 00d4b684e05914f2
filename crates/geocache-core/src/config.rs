//! Application configuration management.
//!
//! Holds the resolver policy, the manual-entry prompt threshold and an
//! optional override for where the coordinate store lives.
//!
//! Configuration is stored at `~/.config/geocache/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::resolver::{PolicyKind, ResolverPolicy, DEFAULT_MANUAL_PROMPT_THRESHOLD};

/// Application name used for config/store directory paths
const APP_NAME: &str = "geocache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

fn default_threshold() -> u32 {
    DEFAULT_MANUAL_PROMPT_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default = "default_threshold")]
    pub manual_prompt_threshold: u32,
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            manual_prompt_threshold: DEFAULT_MANUAL_PROMPT_THRESHOLD,
            store_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where coordinates and fail counters are kept.
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn resolver_policy(&self) -> ResolverPolicy {
        ResolverPolicy::from(self.policy).with_manual_prompt_threshold(self.manual_prompt_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FailurePolicy;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"policy":"robust"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.policy, PolicyKind::Robust);
        assert_eq!(config.manual_prompt_threshold, DEFAULT_MANUAL_PROMPT_THRESHOLD);
        assert_eq!(
            config.resolver_policy().on_failure,
            FailurePolicy::ReturnToIdleAndCount
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            policy: PolicyKind::Robust,
            manual_prompt_threshold: 5,
            store_dir: Some(dir.path().join("store")),
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
        assert_eq!(config.store_dir().unwrap(), dir.path().join("store"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "policy = robust").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
