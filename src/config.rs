// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::bluetooth::{
    Capability, CapabilityModel, GrantedCapabilities, DEFAULT_PEER_NAME, SPP_UUID,
};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Link settings.
    pub link: LinkConfig,

    /// Permissions granted to the link.
    pub permissions: PermissionConfig,
}

/// Which peer to connect to and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Exact name of the bonded peer to connect to.
    pub target_peer_name: String,

    /// RFCOMM service to open on the peer.
    pub service_uuid: Uuid,

    /// Upper bound on the connect handshake, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            target_peer_name: DEFAULT_PEER_NAME.to_string(),
            service_uuid: SPP_UUID,
            connect_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// "modern" or "legacy".
    pub model: CapabilityModel,

    /// Capabilities treated as granted.
    pub granted: Vec<Capability>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        // BlueZ access is governed by D-Bus policy, not runtime prompts.
        Self {
            model: CapabilityModel::Modern,
            granted: vec![Capability::Connect, Capability::Scan],
        }
    }
}

impl PermissionConfig {
    pub fn gate(&self) -> GrantedCapabilities {
        GrantedCapabilities::new(self.model, self.granted.iter().copied())
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("controlrc")
            .join("config.toml")
    }

    /// Load configuration from the default file or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.link.target_peer_name.trim().is_empty() {
            bail!("link.target_peer_name must not be empty");
        }
        if self.link.connect_timeout_secs == 0 {
            bail!("link.connect_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_written_on_first_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.link, LinkConfig::default());
        assert_eq!(config.link.target_peer_name, "ESP32-AUTO");
        assert_eq!(config.link.service_uuid, SPP_UUID);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.link, config.link);
        assert_eq!(reloaded.permissions, config.permissions);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[link]\ntarget_peer_name = \"RC-CAR\"\n\n[permissions]\nmodel = \"legacy\"\ngranted = [\"location\"]\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.link.target_peer_name, "RC-CAR");
        assert_eq!(config.link.connect_timeout_secs, 15);
        assert_eq!(config.permissions.model, CapabilityModel::Legacy);
        assert_eq!(config.permissions.granted, vec![Capability::Location]);

        use crate::bluetooth::PermissionGate;
        assert!(config.permissions.gate().link_permitted());
    }

    #[test]
    fn test_rejects_empty_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[link]\ntarget_peer_name = \"\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
