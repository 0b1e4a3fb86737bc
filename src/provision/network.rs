//! Interface to the network-management layer that drives the radio.
//!
//! The provisioning service never waits for the radio. It issues a request
//! through [`WifiManagement`] and later receives the outcome as a
//! [`NetworkEvent`](super::NetworkEvent).

use super::types::{ApParameters, Passphrase, Security, Ssid};
use std::fmt;
use std::time::Duration;

/// Authentication used for a connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// Open network, no passphrase.
    Open,
    /// Pre-shared key.
    Psk,
}

/// Management frame protection setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfpMode {
    Disabled,
    Optional,
    Required,
}

/// A connect request as handed to the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub ssid: Ssid,
    /// `None` for open networks.
    pub passphrase: Option<Passphrase>,
    pub auth: AuthKind,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub mfp: MfpMode,
}

impl ConnectRequest {
    /// Build the request for stored parameters. Open networks carry no
    /// passphrase; WPA and WEP are both sent as PSK.
    pub fn from_params(params: &ApParameters) -> Self {
        let (auth, passphrase) = match params.security {
            Security::None => (AuthKind::Open, None),
            Security::WpaPsk | Security::Wep => (AuthKind::Psk, Some(params.passphrase.clone())),
        };
        Self {
            ssid: params.ssid,
            passphrase,
            auth,
            timeout: None,
            mfp: MfpMode::Optional,
        }
    }
}

/// Network-management collaborator.
///
/// Implementations must deliver results asynchronously: an `issue_*` call
/// returns once the request is queued, and the matching event arrives later
/// from another context. Delivering an event from inside an `issue_*` call
/// on the calling thread deadlocks the coordinator that issued it.
pub trait WifiManagement: Send + Sync {
    /// Whether a station interface is present.
    fn is_available(&self) -> bool;

    /// Start a scan. Results arrive as `ScanResult` events then `ScanDone`.
    fn issue_scan(&self) -> Result<(), NetworkError>;

    /// Start connecting. The outcome arrives as `ConnectResult`.
    fn issue_connect(&self, request: &ConnectRequest) -> Result<(), NetworkError>;

    /// Start disconnecting. The outcome arrives as `DisconnectResult`.
    fn issue_disconnect(&self) -> Result<(), NetworkError>;
}

/// Errors returned when a request cannot be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// No station interface.
    NoInterface,
    /// The driver refused the request with a status code.
    Rejected { code: i32 },
    /// The driver could not represent the SSID.
    InvalidSsid,
    /// The driver could not represent the passphrase.
    InvalidPassphrase,
    /// Other driver failure.
    Driver(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInterface => write!(f, "no network interface"),
            Self::Rejected { code } => write!(f, "request rejected ({})", code),
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassphrase => write!(f, "invalid passphrase"),
            Self::Driver(msg) => write!(f, "driver error: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {}
