//! Errors returned to the provisioning peer.

use super::network::NetworkError;
use super::types::ParamsError;
use std::fmt;

/// ATT application error: conflicting operation in progress.
pub const ATT_ERR_BUSY: u8 = 0x80;
/// ATT application error: no network interface.
pub const ATT_ERR_UNAVAILABLE: u8 = 0x81;
/// ATT application error: radio refused the request.
pub const ATT_ERR_REQUEST_FAILED: u8 = 0x82;
/// ATT Value Not Allowed.
pub const ATT_ERR_VALUE_NOT_ALLOWED: u8 = 0x13;
/// ATT Insufficient Authentication.
pub const ATT_ERR_INSUFFICIENT_AUTHENTICATION: u8 = 0x05;
/// ATT Write Not Permitted.
pub const ATT_ERR_WRITE_NOT_PERMITTED: u8 = 0x03;

/// Error returned synchronously from an attribute read, write or subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// A conflicting request is already in flight. Retry later.
    Busy,
    /// No network interface is present.
    Unavailable,
    /// The written value is malformed or not the expected sentinel.
    InvalidArgument(String),
    /// The link lacks the security level needed for credentials.
    Unauthorized,
    /// The attribute does not support this operation.
    NotPermitted,
    /// The request was accepted but the radio refused to start it.
    RequestFailed(NetworkError),
}

impl ProvisionError {
    /// Error code to hand back to the ATT layer.
    pub fn att_code(&self) -> u8 {
        match self {
            Self::Busy => ATT_ERR_BUSY,
            Self::Unavailable => ATT_ERR_UNAVAILABLE,
            Self::InvalidArgument(_) => ATT_ERR_VALUE_NOT_ALLOWED,
            Self::Unauthorized => ATT_ERR_INSUFFICIENT_AUTHENTICATION,
            Self::NotPermitted => ATT_ERR_WRITE_NOT_PERMITTED,
            Self::RequestFailed(_) => ATT_ERR_REQUEST_FAILED,
        }
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "operation already in progress"),
            Self::Unavailable => write!(f, "no network interface"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Unauthorized => write!(f, "authenticated encrypted link required"),
            Self::NotPermitted => write!(f, "operation not permitted on attribute"),
            Self::RequestFailed(e) => write!(f, "request failed: {}", e),
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RequestFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NetworkError> for ProvisionError {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::NoInterface => Self::Unavailable,
            other => Self::RequestFailed(other),
        }
    }
}

impl From<ParamsError> for ProvisionError {
    fn from(e: ParamsError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}
