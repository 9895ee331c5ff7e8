//! Provider configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use pvedisk_common::{Error, Result};

use crate::state::{get_bool_attr, get_optional_int_attr, get_optional_string_attr, DynamicValue};

pub const ENV_CONFIG_PATH: &str = "PVEDISK_CONFIG";
pub const ENV_ENDPOINT: &str = "PROXMOX_VE_ENDPOINT";
pub const ENV_API_TOKEN: &str = "PROXMOX_VE_API_TOKEN";
pub const ENV_INSECURE: &str = "PROXMOX_VE_INSECURE";

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Proxmox VE API endpoint, e.g. `https://pve.example.com:8006`
    pub endpoint: Option<String>,

    /// API token in the form `USER@REALM!TOKENID=SECRET`
    pub api_token: Option<String>,

    /// Skip TLS certificate verification
    pub insecure: bool,

    /// HTTP request timeout
    pub timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_token: None,
            insecure: false,
            timeout_seconds: 60,
        }
    }
}

impl ProviderConfig {
    /// Load configuration from file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Config file location, honouring `PVEDISK_CONFIG`
    pub fn default_path() -> PathBuf {
        std::env::var_os(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(pvedisk_common::default_config_path)
    }

    /// Override settings from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.is_empty()) {
            self.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
        if let Some(insecure) = lookup(ENV_INSECURE) {
            self.insecure = matches!(insecure.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }

    /// Apply the attributes of an orchestrator-supplied provider block
    pub fn merge(&mut self, value: &DynamicValue) -> Result<()> {
        if let Some(endpoint) = get_optional_string_attr(value, "endpoint") {
            self.endpoint = Some(endpoint);
        }
        if let Some(token) = get_optional_string_attr(value, "api_token") {
            self.api_token = Some(token);
        }
        self.insecure = get_bool_attr(value, "insecure", self.insecure);
        if let Some(timeout) = get_optional_int_attr(value, "timeout_seconds")? {
            self.timeout_seconds = u64::try_from(timeout)
                .ok()
                .filter(|t| *t > 0)
                .ok_or_else(|| Error::invalid_attribute("timeout_seconds", "must be positive"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{bool_value, int_value, make_state, string_value};

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ProviderConfig {
            endpoint: Some("https://pve:8006".to_string()),
            api_token: Some("root@pam!tf=secret".to_string()),
            insecure: true,
            timeout_seconds: 15,
        };

        config.save(&path).unwrap();
        assert_eq!(ProviderConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "endpoint = \"https://pve:8006\"\n").unwrap();

        let config = ProviderConfig::load(&path).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://pve:8006"));
        assert_eq!(config.timeout_seconds, 60);
        assert!(!config.insecure);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeout_seconds = \"soon\"\n").unwrap();

        assert!(matches!(
            ProviderConfig::load(&path),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = ProviderConfig::default().with_env_from(|key| match key {
            ENV_ENDPOINT => Some("https://env:8006".to_string()),
            ENV_INSECURE => Some("TRUE".to_string()),
            _ => None,
        });

        assert_eq!(config.endpoint.as_deref(), Some("https://env:8006"));
        assert!(config.insecure);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_merge_provider_block() {
        let mut config = ProviderConfig::default();
        let block = make_state(vec![
            ("endpoint", string_value("https://block:8006")),
            ("insecure", bool_value(true)),
            ("timeout_seconds", int_value(5)),
        ]);

        config.merge(&block).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://block:8006"));
        assert!(config.insecure);
        assert_eq!(config.timeout_seconds, 5);

        let bad = make_state(vec![("timeout_seconds", int_value(0))]);
        assert!(config.merge(&bad).is_err());
    }
}
