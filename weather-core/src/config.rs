use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{archive::DEFAULT_ARCHIVE_URL, geocode::DEFAULT_GEOCODE_URL, model::FillPolicy};

/// Environment variable holding the geocoding API key.
///
/// Only [`Config::load`] reads it, and it wins over the file value there.
pub const API_KEY_ENV: &str = "OPENCAGE_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials for the geocoding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub api_key: String,
}

/// Base URLs of the two services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub geocode_url: String,
    pub archive_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// fill_policy = "forward-fill"
///
/// [geocoder]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub fill_policy: FillPolicy,
    pub request_timeout_secs: Option<u64>,
    pub geocoder: Option<GeocoderConfig>,
    pub endpoints: Endpoints,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet,
    /// then apply the [`API_KEY_ENV`] override.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_from(&Self::config_file_path()?)?;
        cfg.override_api_key(std::env::var(API_KEY_ENV).ok());
        Ok(cfg)
    }

    /// Reads the file only; the environment is not consulted.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-archive", "weather-archive")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.geocoder = Some(GeocoderConfig { api_key });
    }

    /// Replace the stored key with `value` unless it is missing or blank.
    pub fn override_api_key(&mut self, value: Option<String>) {
        if let Some(key) = value.filter(|key| !key.trim().is_empty()) {
            self.set_api_key(key);
        }
    }

    /// The configured key; blank counts as missing.
    pub fn api_key(&self) -> Option<String> {
        self.geocoder
            .as_ref()
            .map(|g| g.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();

        assert!(cfg.geocoder.is_none());
        assert_eq!(cfg.fill_policy, FillPolicy::None);
        assert_eq!(cfg.endpoints, Endpoints::default());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.fill_policy = FillPolicy::ForwardFill;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key().as_deref(), Some("KEY"));
        assert_eq!(loaded.fill_policy, FillPolicy::ForwardFill);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "fill_policy = \"forward-fill\"\n").unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.fill_policy, FillPolicy::ForwardFill);
        assert_eq!(cfg.endpoints.archive_url, DEFAULT_ARCHIVE_URL);
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "fill_policy = \"sometimes\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn override_replaces_file_key() {
        let mut cfg = Config::default();
        cfg.set_api_key("FILE_KEY".into());

        cfg.override_api_key(Some("ENV_KEY".into()));
        assert_eq!(cfg.api_key().as_deref(), Some("ENV_KEY"));
    }

    #[test]
    fn blank_or_missing_override_keeps_file_key() {
        let mut cfg = Config::default();
        cfg.set_api_key("FILE_KEY".into());

        cfg.override_api_key(Some("  ".into()));
        assert_eq!(cfg.api_key().as_deref(), Some("FILE_KEY"));

        cfg.override_api_key(None);
        assert_eq!(cfg.api_key().as_deref(), Some("FILE_KEY"));
    }

    #[test]
    fn blank_keys_count_as_missing() {
        let mut cfg = Config::default();
        assert!(cfg.api_key().is_none());

        cfg.set_api_key(String::new());
        assert!(cfg.api_key().is_none());
    }
}
