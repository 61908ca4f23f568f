//! Configuration storage

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::calling::identity::IdPolicy;
use crate::calling::lifecycle::{BusyPolicy, ControllerSettings};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay before acknowledging a push that raised the call UI
    pub completion_delay_ms: u64,
    /// What to do with a second call while one is live
    pub busy_policy: BusyPolicy,
    /// Require every supplied call identifier to be a UUID
    pub strict_call_ids: bool,
    /// Push token registration endpoint
    pub registrar_url: Option<String>,
    /// Bearer token for the registration endpoint
    pub registrar_auth: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion_delay_ms: 1000,
            busy_policy: BusyPolicy::Reject,
            strict_call_ids: false,
            registrar_url: None,
            registrar_auth: None,
        }
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "pushcall", "pushcall")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config file")?;
        config.registrar_url()?;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // May hold the registrar credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn registrar_url(&self) -> Result<Option<Url>> {
        self.registrar_url
            .as_deref()
            .map(|s| Url::parse(s).with_context(|| format!("Invalid registrar_url: {}", s)))
            .transpose()
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            completion_delay: Duration::from_millis(self.completion_delay_ms),
            busy_policy: self.busy_policy,
            id_policy: IdPolicy::from_strict(self.strict_call_ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_all_keys() {
        let config = Config::parse(
            r#"
            completion_delay_ms = 250
            busy_policy = "replace"
            strict_call_ids = true
            registrar_url = "https://push.example.com/register"
            registrar_auth = "s3cret"
            "#,
        )
        .unwrap();
        let settings = config.controller_settings();
        assert_eq!(settings.completion_delay, Duration::from_millis(250));
        assert_eq!(settings.busy_policy, BusyPolicy::Replace);
        assert_eq!(settings.id_policy, IdPolicy::StrictUuid);
        assert_eq!(
            config.registrar_url().unwrap().unwrap().host_str(),
            Some("push.example.com")
        );
    }

    #[test]
    fn test_bad_registrar_url_rejected() {
        assert!(Config::parse(r#"registrar_url = "not a url""#).is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config {
            registrar_url: Some("http://localhost:8080/".into()),
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), config);
    }
}
