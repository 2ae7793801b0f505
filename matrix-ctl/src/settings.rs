//! Application settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use matrix_bridge::DeviceEndpoint;
use matrix_protocol::DEFAULT_TCP_PORT;
use matrix_sim::VirtualMatrixConfig;
use serde::{Deserialize, Serialize};

/// Address the matrix ships with
pub const DEFAULT_HOST: &str = "192.168.0.3";

/// Persisted settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// The matrix to control
    ///
    /// A blank host is replaced by [`DEFAULT_HOST`] on load.
    #[serde(default = "default_endpoint")]
    pub endpoint: DeviceEndpoint,

    /// Virtual matrix used with `--simulate`
    #[serde(default)]
    pub simulator: VirtualMatrixConfig,

    /// Log raw traffic in and out at info level
    #[serde(default)]
    pub show_traffic: bool,
}

fn default_endpoint() -> DeviceEndpoint {
    DeviceEndpoint::new(DEFAULT_HOST, DEFAULT_TCP_PORT)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            simulator: VirtualMatrixConfig::default(),
            show_traffic: false,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for matrix-ctl
    /// Uses $XDG_CONFIG_HOME/matrix-ctl on Linux/macOS, falls back to ~/.config/matrix-ctl
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("matrix-ctl"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("matrix-ctl"))
    }

    /// Settings file path, honouring an explicit override
    pub fn settings_path(custom: Option<&Path>) -> Option<PathBuf> {
        match custom {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_dir().map(|p| p.join("settings.json")),
        }
    }

    /// Load settings from disk
    ///
    /// A missing file gives the defaults. A file that exists but does not
    /// parse is an error, so a typo is not silently replaced on `--save`.
    pub fn load(custom: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = Self::settings_path(custom) else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(json) => Self::from_json(&json)
                .with_context(|| format!("Failed to parse settings in {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read settings from {}", path.display()))
            }
        }
    }

    fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        // An endpoint object without a host takes the library default,
        // which is empty; fall back to the factory address instead
        if !settings.endpoint.has_host() {
            settings.endpoint.host = DEFAULT_HOST.to_string();
        }
        Ok(settings)
    }

    /// Save settings to disk, returning the path written
    pub fn save(&self, custom: Option<&Path>) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path(custom).context("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_factory_address() {
        let settings = Settings::default();
        assert_eq!(settings.endpoint.host, DEFAULT_HOST);
        assert_eq!(settings.endpoint.port, 22);
        assert_eq!(settings.endpoint.poll_interval_ms, 500);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings = Settings::from_json(r#"{"endpoint": {"host": "10.0.0.9"}}"#).unwrap();
        assert_eq!(settings.endpoint.host, "10.0.0.9");
        assert_eq!(settings.endpoint.port, 22);
        assert_eq!(settings.endpoint.poll_interval_ms, 500);
        assert!(!settings.show_traffic);

        let empty = Settings::from_json("{}").unwrap();
        assert_eq!(empty, Settings::default());
    }

    #[test]
    fn test_blank_host_falls_back_to_factory_address() {
        let settings = Settings::from_json(r#"{"endpoint": {}}"#).unwrap();
        assert_eq!(settings.endpoint.host, DEFAULT_HOST);
        assert_eq!(settings.endpoint.port, 22);

        let settings =
            Settings::from_json(r#"{"endpoint": {"host": "  ", "port": 2323}}"#).unwrap();
        assert_eq!(settings.endpoint.host, DEFAULT_HOST);
        assert_eq!(settings.endpoint.port, 2323);
    }

    #[test]
    fn test_save_and_load_custom_path() {
        let path = std::env::temp_dir().join(format!(
            "matrix-ctl-settings-{}.json",
            std::process::id()
        ));

        let mut settings = Settings::default();
        settings.endpoint.host = "matrix.local".into();
        settings.endpoint.poll_interval_ms = 1000;
        settings.show_traffic = true;

        assert_eq!(settings.save(Some(&path)).unwrap(), path);
        let loaded = Settings::load(Some(&path)).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("matrix-ctl-does-not-exist.json");
        assert_eq!(Settings::load(Some(&path)).unwrap(), Settings::default());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "matrix-ctl-corrupt-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").unwrap();
        let result = Settings::load(Some(&path));
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }
}
