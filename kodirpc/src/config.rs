//! # Configuration
//!
//! Default client options live in `config.json` inside the platform config directory.
//! Command-line flags override them.
use anyhow::{Context, Result};
use directories::ProjectDirs;
use kodirpc_core::client::ClientOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientOptions,
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "kodirpc", "kodirpc")
            .context("Could not determine config directory")?;

        Ok(Self::at(proj_dirs.config_dir().join("config.json")))
    }

    pub fn at(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the configuration. A missing file yields the defaults.
    pub fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Could not read {}", self.config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", self.config_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kodirpc_core::client::TransportKind;
    use pretty_assertions::assert_eq;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kodirpc-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let manager = ConfigManager::at(scratch_file("missing.json"));

        assert_eq!(manager.load().unwrap(), AppConfig::default());
    }

    #[test]
    fn loads_partial_configuration() {
        let path = scratch_file("partial.json");
        fs::write(
            &path,
            r#"{"client": {"transport": "ws", "connection": {"host": "kodi.lan"}}}"#,
        )
        .unwrap();

        let config = ConfigManager::at(&path).load().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.client.transport, TransportKind::Ws);
        assert_eq!(config.client.connection.host, "kodi.lan");
        assert!(config.client.connection.close_on_request);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let path = scratch_file("invalid.json");
        fs::write(&path, "{ not json").unwrap();

        let result = ConfigManager::at(&path).load();
        fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }
}
