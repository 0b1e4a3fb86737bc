//! BLE Wi-Fi provisioning bridge for ESP32.
//!
//! A BLE central scans for access points and hands over credentials through
//! two GATT services; this crate turns those attribute operations into
//! requests to the Wi-Fi station and reports the outcome back.
//!
//! Everything except [`ble`]'s NimBLE server and [`wifi`] is
//! platform-independent and tested on the host.

pub mod ble;
pub mod config;
pub mod provision;
#[cfg(not(target_os = "espidf"))]
pub mod sim;
#[cfg(feature = "esp32")]
pub mod wifi;

// Re-export commonly used items
pub use config::{ConfigError, ConnectFailurePolicy, ProvisionConfig};
pub use provision::{
    Attribute, ConnectionState, LinkSecurity, NetworkEvent, ProvisionError, ProvisioningService,
    ScanState, WifiManagement,
};
