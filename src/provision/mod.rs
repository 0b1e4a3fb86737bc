//! Wi-Fi provisioning state machines.
//!
//! Two coordinators share nothing but the notification gateway:
//!
//! - [`scan`] - scanning mode and the AP result buffer
//! - [`connect`] - connection state and the target AP parameters
//! - [`station`] - maps raw station link events to result events
//!
//! [`ProvisioningService`] binds them to attribute-style reads, writes and
//! subscriptions for the BLE transport, and accepts [`NetworkEvent`]s from
//! the network-management layer.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wifi_provision_esp32::config::ProvisionConfig;
//! use wifi_provision_esp32::provision::{
//!     Attribute, ConnectRequest, LinkSecurity, NetworkError, NetworkEvent,
//!     ProvisioningService, ScanState, WifiManagement, START_SCAN,
//! };
//! use wifi_provision_esp32::provision::event::EventStatus;
//!
//! struct NullRadio;
//!
//! impl WifiManagement for NullRadio {
//!     fn is_available(&self) -> bool { true }
//!     fn issue_scan(&self) -> Result<(), NetworkError> { Ok(()) }
//!     fn issue_connect(&self, _: &ConnectRequest) -> Result<(), NetworkError> { Ok(()) }
//!     fn issue_disconnect(&self) -> Result<(), NetworkError> { Ok(()) }
//! }
//!
//! let service = ProvisioningService::new(&ProvisionConfig::default(), Arc::new(NullRadio));
//! service.write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN).unwrap();
//! service.handle_event(NetworkEvent::ScanDone(EventStatus::SUCCESS));
//! assert_eq!(service.scanning_mode(), ScanState::Done);
//! ```

mod ap_buffer;
pub mod connect;
pub mod error;
pub mod event;
pub mod network;
mod notify;
pub mod scan;
mod service;
pub mod station;
pub mod types;

pub use ap_buffer::ApResultBuffer;
pub use connect::{ConnectCoordinator, ConnectionState, DISCONNECT};
pub use error::ProvisionError;
pub use event::{EventStatus, NetworkEvent, ScanResult};
pub use network::{AuthKind, ConnectRequest, MfpMode, NetworkError, WifiManagement};
pub use notify::{CoordinatorId, NotificationGateway, NotificationSink, QueuedSink};
pub use scan::{ScanCoordinator, ScanState, START_SCAN};
pub use service::{Attribute, LinkSecurity, ProvisioningService};
pub use station::{scan_done_events, StationTracker};
pub use types::{
    AccessPointRecord, ApParameters, Band, Freshness, ParamsError, Passphrase, Security, Ssid,
    AP_PARAMETERS_LEN, AP_RECORD_LEN,
};
