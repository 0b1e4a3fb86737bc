//! Translation of raw station link events into [`NetworkEvent`]s.
//!
//! The radio reports a bare "disconnected" whether the link was dropped by
//! a failed attempt, by an explicit disconnect, or by reconfiguring a
//! connected station. [`StationTracker`] remembers which request is in
//! flight so each drop is reported as the right result.

use super::event::{EventStatus, NetworkEvent, ScanResult};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};

/// Status reported when the station drops during a connect attempt.
pub const STATUS_STA_DISCONNECTED: i32 = -1;

/// Status reported when the radio marks a finished scan as failed.
pub const STATUS_SCAN_FAILED: i32 = -2;

/// In-flight station request flags shared between the request path and
/// the event callback.
#[derive(Debug, Default)]
pub struct StationTracker {
    connecting: AtomicBool,
    expect_drop: AtomicBool,
}

impl StationTracker {
    pub const fn new() -> Self {
        Self {
            connecting: AtomicBool::new(false),
            expect_drop: AtomicBool::new(false),
        }
    }

    /// The next drop is the old link going away before a re-target.
    pub fn expect_drop(&self) {
        self.expect_drop.store(true, Ordering::SeqCst);
    }

    /// The drop requested by [`expect_drop`](Self::expect_drop) will not
    /// come after all.
    pub fn cancel_expected_drop(&self) {
        self.expect_drop.store(false, Ordering::SeqCst);
    }

    pub fn begin_connect(&self) {
        self.connecting.store(true, Ordering::SeqCst);
    }

    /// The connect request was refused before reaching the air.
    pub fn abort_connect(&self) {
        self.connecting.store(false, Ordering::SeqCst);
    }

    /// A drop after this point is the requested disconnect, not a failed
    /// connect.
    pub fn begin_disconnect(&self) {
        self.connecting.store(false, Ordering::SeqCst);
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    pub fn on_connected(&self) -> NetworkEvent {
        self.expect_drop.store(false, Ordering::SeqCst);
        self.connecting.store(false, Ordering::SeqCst);
        NetworkEvent::ConnectResult(EventStatus::SUCCESS)
    }

    /// Returns `None` for the one drop announced by
    /// [`expect_drop`](Self::expect_drop).
    pub fn on_disconnected(&self) -> Option<NetworkEvent> {
        if self.expect_drop.swap(false, Ordering::SeqCst) {
            debug!("Swallowed drop of the previous link");
            return None;
        }
        if self.connecting.swap(false, Ordering::SeqCst) {
            Some(NetworkEvent::ConnectResult(EventStatus::failure(
                STATUS_STA_DISCONNECTED,
            )))
        } else {
            Some(NetworkEvent::DisconnectResult(EventStatus::SUCCESS))
        }
    }
}

/// Events for a finished scan: the results, then `ScanDone` with the
/// radio's status. A failed scan carries no results.
pub fn scan_done_events(
    successful: bool,
    results: Result<Vec<ScanResult>, i32>,
) -> Vec<NetworkEvent> {
    if !successful {
        return vec![NetworkEvent::ScanDone(EventStatus::failure(
            STATUS_SCAN_FAILED,
        ))];
    }
    match results {
        Ok(aps) => {
            let mut out: Vec<NetworkEvent> = aps.into_iter().map(NetworkEvent::ScanResult).collect();
            out.push(NetworkEvent::ScanDone(EventStatus::SUCCESS));
            out
        }
        Err(code) => vec![NetworkEvent::ScanDone(EventStatus::failure(code))],
    }
}
