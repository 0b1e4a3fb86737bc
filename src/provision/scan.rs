//! Scan coordinator.
//!
//! ```text
//!          request_scan(START_SCAN)           on_scan_done(_)
//!   Idle ───────────────────────────▶ Running ────────────────▶ Done
//!                                       ▲                        │
//!                                       └────────────────────────┘
//!                                          request_scan(START_SCAN)
//! ```
//!
//! Writes while Running are rejected with `Busy`. Scan results are only
//! collected while Running; late results are ignored.

use super::ap_buffer::ApResultBuffer;
use super::error::ProvisionError;
use super::event::{EventStatus, ScanResult};
use super::network::WifiManagement;
use super::types::AccessPointRecord;
use log::{debug, info, warn};

/// The only value accepted by a scanning-mode write.
pub const START_SCAN: u8 = 0x01;

/// Scanning mode exposed to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ScanState {
    #[default]
    Idle = 0x00,
    Running = 0x01,
    Done = 0x02,
}

impl ScanState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Owns the scanning mode and the AP result buffer.
#[derive(Debug)]
pub struct ScanCoordinator {
    state: ScanState,
    buffer: ApResultBuffer,
}

impl ScanCoordinator {
    /// Create an idle coordinator with `capacity` AP slots.
    pub fn new(capacity: u8) -> Self {
        Self {
            state: ScanState::Idle,
            buffer: ApResultBuffer::new(capacity),
        }
    }

    /// Handle a scanning-mode write.
    ///
    /// On success the buffer is empty, the state is Running and the radio
    /// has been asked to scan. If the radio refuses, state and buffer are
    /// put back as they were.
    pub fn request_scan(
        &mut self,
        mode: u8,
        wifi: &dyn WifiManagement,
    ) -> Result<(), ProvisionError> {
        if mode != START_SCAN {
            return Err(ProvisionError::InvalidArgument(format!(
                "scanning mode {:#04x} is not START_SCAN",
                mode
            )));
        }
        if self.state == ScanState::Running {
            return Err(ProvisionError::Busy);
        }
        if !wifi.is_available() {
            return Err(ProvisionError::Unavailable);
        }

        let (prev_state, prev_count) = (self.state, self.buffer.count());
        self.buffer.reset();
        self.state = ScanState::Running;

        if let Err(e) = wifi.issue_scan() {
            warn!("Scan request refused: {}", e);
            self.state = prev_state;
            self.buffer.restore_count(prev_count);
            return Err(e.into());
        }

        info!("Scan started");
        Ok(())
    }

    /// Record one scan result. Returns whether it was stored.
    ///
    /// Results outside a running scan, past capacity, or with an oversized
    /// SSID are dropped without error.
    pub fn on_scan_result(&mut self, result: &ScanResult) -> bool {
        if self.state != ScanState::Running {
            debug!("Ignoring scan result outside a running scan");
            return false;
        }
        let Some(record) = result.to_record() else {
            warn!("Dropping scan result with {}-byte SSID", result.ssid.len());
            return false;
        };
        let stored = self.buffer.try_push(record);
        if stored {
            debug!(
                "AP #{}: {} ch {} rssi {}",
                self.buffer.count() - 1,
                record.ssid,
                record.channel,
                record.rssi
            );
        } else {
            debug!("AP buffer full, dropping {}", record.ssid);
        }
        stored
    }

    /// Finish the scan. Always ends in Done, whatever the status.
    pub fn on_scan_done(&mut self, status: EventStatus) -> ScanState {
        if status.is_success() {
            info!("Scan done: {} APs", self.buffer.count());
        } else {
            warn!(
                "Scan failed ({}), keeping {} APs",
                status.code(),
                self.buffer.count()
            );
        }
        self.state = ScanState::Done;
        self.state
    }

    pub fn scanning_mode(&self) -> ScanState {
        self.state
    }

    pub fn ap_count(&self) -> u8 {
        self.buffer.count()
    }

    /// Every buffer slot; only the first [`ap_count`](Self::ap_count) belong
    /// to the latest scan.
    pub fn ap_details(&self) -> Vec<AccessPointRecord> {
        self.buffer.snapshot().1
    }

    pub fn buffer(&self) -> &ApResultBuffer {
        &self.buffer
    }
}
