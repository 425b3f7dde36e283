//! Bridge configuration
//!
//! One TOML file holds the bridge-wide timings and a `[[devices]]` entry per
//! paired TV. The default location is `<config_dir>/viera-bridge/config.toml`.

use crate::client::Credentials;
use crate::session::SessionTiming;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use viera_shared::{timing, wol};

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("device {0}: host must not be empty")]
    MissingHost(String),

    #[error("device {0}: port must be non-zero")]
    InvalidPort(String),

    #[error("device {0}: app_id and encryption_key must be set together")]
    IncompleteCredentials(String),

    #[error("device {0}: invalid MAC address: {1}")]
    InvalidMac(String, String),

    #[error("duplicate device identifier: {0}")]
    DuplicateDevice(String),

    #[error("{0} must be greater than 0")]
    ZeroInterval(&'static str),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn default_port() -> u16 {
    timing::DEFAULT_PORT
}

/// Identity and connection facts for one TV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub identifier: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

impl DeviceConfig {
    /// A plain device entry with a derived identifier and no credentials
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            identifier: derive_identifier(&host, port),
            name: name.into(),
            host,
            port,
            app_id: None,
            encryption_key: None,
            mac_address: None,
        }
    }

    pub fn with_credentials(mut self, credentials: &Credentials) -> Self {
        self.app_id = Some(credentials.app_id.clone());
        self.encryption_key = Some(credentials.encryption_key.clone());
        self
    }

    pub fn with_mac_address(mut self, mac: Option<String>) -> Self {
        self.mac_address = mac.filter(|m| !m.trim().is_empty());
        self
    }

    /// Pairing credentials, when both halves are configured
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.app_id.as_deref(), self.encryption_key.as_deref())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost(self.identifier.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.identifier.clone()));
        }

        let has_id = self.app_id.as_deref().is_some_and(|s| !s.is_empty());
        let has_key = self.encryption_key.as_deref().is_some_and(|s| !s.is_empty());
        if has_id != has_key {
            return Err(ConfigError::IncompleteCredentials(self.identifier.clone()));
        }

        if let Some(mac) = &self.mac_address {
            if let Err(e) = wol::normalize_mac(mac) {
                return Err(ConfigError::InvalidMac(self.identifier.clone(), e.to_string()));
            }
        }

        Ok(())
    }
}

/// Deterministic device identifier for a host and port
pub fn derive_identifier(host: &str, port: u16) -> String {
    format!("viera_{}_{}", host.replace('.', "_"), port)
}

/// Top-level bridge configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub log_level: String,
    pub poll_interval_secs: u64,
    pub wake_settle_secs: u64,
    pub power_on_settle_secs: u64,
    pub request_timeout_secs: u64,
    pub devices: Vec<DeviceConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            poll_interval_secs: timing::POLL_INTERVAL_SECS,
            wake_settle_secs: timing::WAKE_SETTLE_SECS,
            power_on_settle_secs: timing::POWER_ON_SETTLE_SECS,
            request_timeout_secs: timing::REQUEST_TIMEOUT_SECS,
            devices: Vec::new(),
        }
    }
}

/// Returns the default configuration file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("viera-bridge")
        .join("config.toml")
}

impl BridgeConfig {
    /// Load configuration from a file, or defaults if it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration, creating parent directories if needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("poll_interval_secs"));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval("request_timeout_secs"));
        }

        let mut seen = std::collections::HashSet::new();
        for device in &self.devices {
            device.validate()?;
            if !seen.insert(device.identifier.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.identifier.clone()));
            }
        }

        Ok(())
    }

    /// Add a device, replacing any entry with the same identifier
    ///
    /// Returns true when an existing entry was replaced.
    pub fn upsert_device(&mut self, device: DeviceConfig) -> bool {
        match self
            .devices
            .iter_mut()
            .find(|d| d.identifier == device.identifier)
        {
            Some(existing) => {
                *existing = device;
                true
            }
            None => {
                self.devices.push(device);
                false
            }
        }
    }

    /// Remove a device by identifier
    pub fn remove_device(&mut self, identifier: &str) -> Option<DeviceConfig> {
        let pos = self.devices.iter().position(|d| d.identifier == identifier)?;
        Some(self.devices.remove(pos))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_timing(&self) -> SessionTiming {
        SessionTiming {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            wake_settle: Duration::from_secs(self.wake_settle_secs),
            power_on_settle: Duration::from_secs(self.power_on_settle_secs),
        }
    }
}
