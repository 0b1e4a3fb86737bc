//! Config file loading for host (development) builds.
//!
//! Reads a JSON document whose fields mirror [`ProvisionConfig`]. Missing
//! fields fall back to their defaults, unknown fields are rejected.
//!
//! ```json
//! {
//!   "ap_capacity": 8,
//!   "connect_failure": "mark_disconnected",
//!   "device_name": "Bench-Provisioner"
//! }
//! ```

use super::{ConfigError, ProvisionConfig};
use log::info;
use std::fs;
use std::path::Path;

/// Parse and validate a configuration from a JSON string.
pub fn parse_config(json: &str) -> Result<ProvisionConfig, ConfigError> {
    let config: ProvisionConfig =
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a configuration file.
pub fn load_config_from(path: &Path) -> Result<ProvisionConfig, ConfigError> {
    let json = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let config = parse_config(&json)?;
    info!("Loaded config from {:?}", path);
    Ok(config)
}
