use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use client_core::ControllerSettings;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "factshield.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub server_url: Option<String>,
    pub local_store: Option<String>,
    pub admin_username: Option<String>,
    pub notification_seconds: Option<u64>,
}

/// Which adapter backs the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Http(String),
    LocalFile(String),
    InMemory,
}

impl ConsoleConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Flag values win over file values.
    pub fn overlay(self, flags: ConsoleConfig) -> Self {
        Self {
            server_url: flags.server_url.or(self.server_url),
            local_store: flags.local_store.or(self.local_store),
            admin_username: flags.admin_username.or(self.admin_username),
            notification_seconds: flags.notification_seconds.or(self.notification_seconds),
        }
    }

    pub fn backend(&self) -> Backend {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        if let Some(url) = non_blank(&self.server_url) {
            Backend::Http(url)
        } else if let Some(path) = non_blank(&self.local_store) {
            Backend::LocalFile(path)
        } else {
            Backend::InMemory
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        let defaults = ControllerSettings::default();
        ControllerSettings {
            admin_username: self
                .admin_username
                .clone()
                .unwrap_or(defaults.admin_username),
            notification_ttl: self
                .notification_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.notification_ttl),
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
