//! Service configuration.
//!
//! This module contains platform-independent configuration types that can be
//! tested on the host machine, plus the wire-size limits shared by the
//! provisioning attributes.
//!
//! # Components
//!
//! - [`ProvisionConfig`] - AP buffer capacity, connect failure policy, device name
//! - [`host`] - JSON config file loading (host only)
//!
//! # Example
//!
//! ```
//! use wifi_provision_esp32::config::{ConnectFailurePolicy, ProvisionConfig};
//!
//! let config = ProvisionConfig::default()
//!     .with_ap_capacity(4)
//!     .with_connect_failure(ConnectFailurePolicy::MarkConnected);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.ap_capacity, 4);
//! ```

#[cfg(not(target_os = "espidf"))]
pub mod host;

use std::fmt;

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum passphrase length (WPA2 passphrases are 8-63 ASCII characters).
pub const MAX_PASSPHRASE_LEN: usize = 63;

/// Minimum passphrase length for WPA/WPA2 personal.
pub const MIN_PSK_LEN: usize = 8;

/// Number of AP records kept by default.
pub const DEFAULT_AP_CAPACITY: u8 = 15;

/// Default BLE advertisement name.
pub const DEFAULT_DEVICE_NAME: &str = "WiFi-Provisioning";

/// Longest device name that fits a legacy scan response.
pub const MAX_DEVICE_NAME_LEN: usize = 29;

/// What the connect coordinator does when the radio reports a failed
/// connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    not(target_os = "espidf"),
    derive(serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ConnectFailurePolicy {
    /// A failed attempt leaves the station Disconnected.
    #[default]
    MarkDisconnected,
    /// A failed attempt is still reported as Connected. Matches older
    /// firmware that ignored the result status.
    MarkConnected,
}

/// Provisioning service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    not(target_os = "espidf"),
    derive(serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct ProvisionConfig {
    /// Number of access point records kept per scan (1-255).
    pub ap_capacity: u8,
    /// Connection state applied after a failed connect result.
    pub connect_failure: ConnectFailurePolicy,
    /// Name used in BLE advertisements.
    pub device_name: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            ap_capacity: DEFAULT_AP_CAPACITY,
            connect_failure: ConnectFailurePolicy::default(),
            device_name: DEFAULT_DEVICE_NAME.to_string(),
        }
    }
}

impl ProvisionConfig {
    /// Set the AP buffer capacity.
    pub fn with_ap_capacity(mut self, capacity: u8) -> Self {
        self.ap_capacity = capacity;
        self
    }

    /// Set the connect failure policy.
    pub fn with_connect_failure(mut self, policy: ConnectFailurePolicy) -> Self {
        self.connect_failure = policy;
        self
    }

    /// Set the advertised device name.
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ap_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.device_name.is_empty() {
            return Err(ConfigError::DeviceNameEmpty);
        }
        if self.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(ConfigError::DeviceNameTooLong {
                len: self.device_name.len(),
                max: MAX_DEVICE_NAME_LEN,
            });
        }
        Ok(())
    }
}

/// Errors that can occur while building or loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// AP buffer capacity must hold at least one record.
    ZeroCapacity,
    /// Device name is empty.
    DeviceNameEmpty,
    /// Device name does not fit an advertisement.
    DeviceNameTooLong { len: usize, max: usize },
    /// Config file could not be read.
    Io(String),
    /// Config file is not valid JSON or has unknown fields.
    InvalidFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "AP capacity must be at least 1"),
            Self::DeviceNameEmpty => write!(f, "device name cannot be empty"),
            Self::DeviceNameTooLong { len, max } => {
                write!(f, "device name too long: {} bytes (max {})", len, max)
            }
            Self::Io(msg) => write!(f, "config I/O error: {}", msg),
            Self::InvalidFormat(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProvisionConfig::default();
        assert_eq!(config.ap_capacity, DEFAULT_AP_CAPACITY);
        assert_eq!(config.connect_failure, ConnectFailurePolicy::MarkDisconnected);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = ProvisionConfig::default().with_ap_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }

    #[test]
    fn test_max_capacity_accepted() {
        let config = ProvisionConfig::default().with_ap_capacity(u8::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_device_name() {
        let config = ProvisionConfig::default().with_device_name("");
        assert_eq!(config.validate(), Err(ConfigError::DeviceNameEmpty));
    }

    #[test]
    fn test_device_name_too_long() {
        let config = ProvisionConfig::default().with_device_name("x".repeat(30));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DeviceNameTooLong { len: 30, max: 29 })
        ));
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::DeviceNameTooLong { len: 40, max: 29 };
        assert_eq!(err.to_string(), "device name too long: 40 bytes (max 29)");
    }
}
