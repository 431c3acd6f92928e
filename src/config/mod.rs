//! Configuration management.
//!
//! Connection settings are resolved per field, highest priority first:
//! 1. Explicit command-line flag
//! 2. `VRSYNC_*` environment variable
//! 3. JSON config file (`~/.vrsync/config.json`, or `--config` / `VRSYNC_CONFIG`)
//! 4. Built-in default
//!
//! ```json
//! {
//!   "host": "ops.example.com",
//!   "token": "...",
//!   "ssh_user": "root",
//!   "insecure": true
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_TIMEOUT_SECS: u64 = 360;

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV: &str = "VRSYNC_CONFIG";

/// Global vrsync directory, `~/.vrsync/`.
#[must_use]
pub fn global_vrsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".vrsync"))
}

/// Default config file location, `~/.vrsync/config.json`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    global_vrsync_dir().map(|dir| dir.join("config.json"))
}

/// Partial settings: one layer of the resolution (flags, env or file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsLayer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
    pub ssh_user: Option<String>,
    pub ssh_port: Option<u16>,
    pub insecure: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub temp_dir: Option<PathBuf>,
}

impl SettingsLayer {
    /// Read a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {e}", path.display())))
    }

    /// Build a layer from `VRSYNC_*` variables looked up with `var`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric or boolean variable does not parse.
    pub fn from_env_with<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: text("VRSYNC_HOST"),
            port: parse_env("VRSYNC_PORT", text("VRSYNC_PORT"))?,
            token: text("VRSYNC_TOKEN"),
            ssh_user: text("VRSYNC_SSH_USER"),
            ssh_port: parse_env("VRSYNC_SSH_PORT", text("VRSYNC_SSH_PORT"))?,
            insecure: text("VRSYNC_INSECURE")
                .map(|v| parse_bool("VRSYNC_INSECURE", &v))
                .transpose()?,
            timeout_secs: parse_env("VRSYNC_TIMEOUT", text("VRSYNC_TIMEOUT"))?,
            temp_dir: text("VRSYNC_TEMP_DIR").map(PathBuf::from),
        })
    }

    /// Fill every unset field from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            host: self.host.or(lower.host),
            port: self.port.or(lower.port),
            token: self.token.or(lower.token),
            ssh_user: self.ssh_user.or(lower.ssh_user),
            ssh_port: self.ssh_port.or(lower.ssh_port),
            insecure: self.insecure.or(lower.insecure),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            temp_dir: self.temp_dir.or(lower.temp_dir),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| Error::Config(format!("Invalid value for {name}: '{v}' ({e})")))
        })
        .transpose()
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "Invalid value for {name}: '{other}' (expected true or false)"
        ))),
    }
}

/// Fully resolved server connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSettings {
    pub host: Option<String>,
    pub port: u16,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub ssh_user: String,
    pub ssh_port: u16,
    /// Accept invalid TLS certificates and unknown SSH host keys.
    pub insecure: bool,
    pub timeout_secs: u64,
    /// Workspace root for staging directories; system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_layer(SettingsLayer::default())
    }
}

impl ConnectionSettings {
    /// Apply built-in defaults to whatever `layer` leaves unset.
    #[must_use]
    pub fn from_layer(layer: SettingsLayer) -> Self {
        Self {
            host: layer.host,
            port: layer.port.unwrap_or(DEFAULT_PORT),
            token: layer.token,
            ssh_user: layer.ssh_user.unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
            ssh_port: layer.ssh_port.unwrap_or(DEFAULT_SSH_PORT),
            insecure: layer.insecure.unwrap_or(false),
            timeout_secs: layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            temp_dir: layer.temp_dir,
        }
    }

    /// Resolve flags, process environment and config file.
    ///
    /// `config_path` is the explicit `--config` value; when absent the
    /// default location is used if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicit config file is missing or
    /// any layer fails to parse.
    pub fn resolve(flags: SettingsLayer, config_path: Option<&Path>) -> Result<Self> {
        Self::resolve_with(flags, config_path, |name| std::env::var(name).ok())
    }

    /// Like [`ConnectionSettings::resolve`] with an injected environment.
    ///
    /// # Errors
    ///
    /// See [`ConnectionSettings::resolve`].
    pub fn resolve_with<F>(flags: SettingsLayer, config_path: Option<&Path>, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = SettingsLayer::from_env_with(&var)?;

        let file = match config_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                SettingsLayer::from_file(path)?
            }
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => {
                    debug!(path = %path.display(), "Loading config file");
                    SettingsLayer::from_file(&path)?
                }
                None => SettingsLayer::default(),
            },
        };

        Ok(Self::from_layer(flags.or(env).or(file)))
    }

    /// Base URL of the Suite API.
    #[must_use]
    pub fn suite_api_url(&self) -> String {
        format!(
            "https://{}:{}/suite-api",
            self.host.as_deref().unwrap_or_default(),
            self.port
        )
    }

    /// Check that everything needed to reach the server is present.
    ///
    /// # Errors
    ///
    /// Returns one [`Error::Config`] naming every missing field.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.host.as_deref().is_none_or(|h| h.trim().is_empty()) {
            missing.push("host");
        }
        if self.token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            missing.push("token");
        }
        if self.ssh_user.trim().is_empty() {
            missing.push("ssh_user");
        }
        if self.port == 0 {
            missing.push("port");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Configuration validation failed: Empty {}",
                missing.join(" ")
            )))
        }
    }

    /// Workspace root for staging directories.
    #[must_use]
    pub fn workspace_root(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(crate::sync::default_temp_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.port, 443);
        assert_eq!(settings.ssh_user, "root");
        assert_eq!(settings.ssh_port, 22);
        assert_eq!(settings.timeout_secs, 360);
        assert!(!settings.insecure);
    }

    #[test]
    fn test_flag_beats_env_beats_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"host": "file-host", "token": "file-token", "ssh_port": 2222}"#,
        )
        .unwrap();

        let flags = SettingsLayer {
            host: Some("flag-host".to_string()),
            ..SettingsLayer::default()
        };
        let settings = ConnectionSettings::resolve_with(
            flags,
            Some(&path),
            env(&[("VRSYNC_HOST", "env-host"), ("VRSYNC_TOKEN", "env-token")]),
        )
        .unwrap();

        assert_eq!(settings.host.as_deref(), Some("flag-host"));
        assert_eq!(settings.token.as_deref(), Some("env-token"));
        assert_eq!(settings.ssh_port, 2222);
        assert_eq!(settings.port, 443);
    }

    #[test]
    fn test_env_parse_errors() {
        let result = SettingsLayer::from_env_with(env(&[("VRSYNC_PORT", "https")]));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("VRSYNC_PORT")));

        let layer = SettingsLayer::from_env_with(env(&[("VRSYNC_INSECURE", "yes")])).unwrap();
        assert_eq!(layer.insecure, Some(true));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConnectionSettings::resolve_with(
            SettingsLayer::default(),
            Some(&temp_dir.path().join("missing.json")),
            env(&[]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_lists_every_missing_field() {
        let err = ConnectionSettings::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration validation failed: Empty host token"
        );

        let settings = ConnectionSettings::from_layer(SettingsLayer {
            host: Some("ops.example.com".to_string()),
            token: Some("t".to_string()),
            ..SettingsLayer::default()
        });
        assert!(settings.validate().is_ok());
        assert_eq!(settings.suite_api_url(), "https://ops.example.com:443/suite-api");
    }
}
