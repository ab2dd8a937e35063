//! RelayClaw configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};
use crate::types::UserId;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Telegram Bot API token.
    #[serde(default)]
    pub bot_token: String,
    /// Principals allowed to issue commands at process start.
    /// At least one must be present; these are the "original" admins the
    /// last-admin protection guards.
    #[serde(default)]
    pub admin_ids: Vec<UserId>,
    /// Default recurring-forward interval in seconds.
    #[serde(default = "default_interval")]
    pub forward_interval_secs: u64,
    /// Long-poll pause between update batches, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_interval() -> u64 {
    300
}
fn default_poll_interval() -> u64 {
    1
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_ids: Vec::new(),
            forward_interval_secs: default_interval(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl RelayConfig {
    /// Load config from the default path (~/.relayclaw/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RelayError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the RelayClaw home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".relayclaw")
    }

    /// Validate the parts the agent cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.is_empty() {
            return Err(RelayError::config("bot_token is not set"));
        }
        if self.admin_ids.is_empty() {
            return Err(RelayError::config("at least one admin_id is required"));
        }
        if self.forward_interval_secs < 60 {
            return Err(RelayError::config("forward_interval_secs must be >= 60"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.forward_interval_secs, 300);
        assert_eq!(cfg.poll_interval_secs, 1);
        assert!(cfg.admin_ids.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let cfg: RelayConfig =
            toml::from_str("bot_token = \"123:abc\"\nadmin_ids = [42]\n").unwrap();
        assert_eq!(cfg.bot_token, "123:abc");
        assert_eq!(cfg.admin_ids, vec![42]);
        assert_eq!(cfg.forward_interval_secs, 300);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_admins() {
        let cfg: RelayConfig = toml::from_str("bot_token = \"123:abc\"\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_interval() {
        let cfg: RelayConfig = toml::from_str(
            "bot_token = \"t\"\nadmin_ids = [1]\nforward_interval_secs = 30\n",
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }
}
