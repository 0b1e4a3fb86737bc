//! Events delivered by the network-management layer.

use super::types::{AccessPointRecord, Band, Freshness, Ssid};

/// Completion status reported with a result event. Zero means success,
/// anything else is a driver-specific failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStatus(pub i32);

impl EventStatus {
    pub const SUCCESS: Self = Self(0);

    pub fn failure(code: i32) -> Self {
        Self(code)
    }

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    pub fn code(&self) -> i32 {
        self.0
    }
}

/// A single access point reported during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Raw SSID bytes as reported by the radio.
    pub ssid: Vec<u8>,
    pub channel: u8,
    pub band: Band,
    pub rssi: i8,
}

impl ScanResult {
    pub fn new(ssid: impl Into<Vec<u8>>, channel: u8, band: Band, rssi: i8) -> Self {
        Self {
            ssid: ssid.into(),
            channel,
            band,
            rssi,
        }
    }

    /// Convert to a buffer record. Returns `None` if the SSID is longer
    /// than 32 bytes.
    pub fn to_record(&self) -> Option<AccessPointRecord> {
        Some(AccessPointRecord {
            freshness: Freshness::Current,
            channel: self.channel,
            band: self.band,
            rssi: self.rssi,
            ssid: Ssid::new(&self.ssid)?,
        })
    }
}

/// Inbound event from the network-management collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    ScanResult(ScanResult),
    ScanDone(EventStatus),
    ConnectResult(EventStatus),
    DisconnectResult(EventStatus),
}

impl NetworkEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScanResult(_) => "scan-result",
            Self::ScanDone(_) => "scan-done",
            Self::ConnectResult(_) => "connect-result",
            Self::DisconnectResult(_) => "disconnect-result",
        }
    }
}
