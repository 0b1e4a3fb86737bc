//! Connect coordinator.
//!
//! ```text
//!                write_ap_parameters            on_connect_result(ok)
//!   Disconnected ───────────────────▶ Connecting ──────────────────▶ Connected
//!        ▲                                 │                            │
//!        │   on_connect_result(err)*       │                            │
//!        ├─────────────────────────────────┘                            │
//!        │   on_disconnect_result(_)                                    │
//!        └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `*` depends on [`ConnectFailurePolicy`]. A parameter write while
//! Connected re-targets the station and goes back to Connecting.
//!
//! Disconnect requests do not have an intermediate state: the state stays
//! put until the disconnect result arrives.

use super::error::ProvisionError;
use super::event::EventStatus;
use super::network::{ConnectRequest, WifiManagement};
use super::types::ApParameters;
use crate::config::ConnectFailurePolicy;
use log::{info, warn};

/// The only value accepted by a connection-state write.
pub const DISCONNECT: u8 = 0x00;

/// Station connection state exposed to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0x00,
    Connecting = 0x01,
    Connected = 0x02,
}

impl ConnectionState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Owns the connection state and the last accepted AP parameters.
#[derive(Debug)]
pub struct ConnectCoordinator {
    state: ConnectionState,
    params: ApParameters,
    failure_policy: ConnectFailurePolicy,
}

impl ConnectCoordinator {
    pub fn new(failure_policy: ConnectFailurePolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            params: ApParameters::default(),
            failure_policy,
        }
    }

    /// Handle an ap-parameters write.
    ///
    /// Stores `params`, moves to Connecting and asks the radio to connect.
    /// If the radio refuses, the previous parameters and state are restored.
    pub fn write_ap_parameters(
        &mut self,
        params: ApParameters,
        wifi: &dyn WifiManagement,
    ) -> Result<(), ProvisionError> {
        if self.state == ConnectionState::Connecting {
            return Err(ProvisionError::Busy);
        }
        if !wifi.is_available() {
            return Err(ProvisionError::Unavailable);
        }

        if self.state == ConnectionState::Connected {
            info!("Re-targeting connection to {}", params.ssid);
        }

        let request = ConnectRequest::from_params(&params);
        let prev_params = std::mem::replace(&mut self.params, params);
        let prev_state = self.state;
        self.state = ConnectionState::Connecting;

        if let Err(e) = wifi.issue_connect(&request) {
            warn!("Connect request refused: {}", e);
            self.params = prev_params;
            self.state = prev_state;
            return Err(e.into());
        }

        info!(
            "Connecting to {} ({:?}, {}-byte passphrase)",
            self.params.ssid,
            self.params.security,
            self.params.passphrase.len()
        );
        Ok(())
    }

    /// Handle a connection-state write.
    ///
    /// Already Disconnected is a no-op success. Otherwise the radio is asked
    /// to disconnect and the state is left unchanged until the result.
    pub fn request_disconnect(
        &mut self,
        value: u8,
        wifi: &dyn WifiManagement,
    ) -> Result<(), ProvisionError> {
        if value != DISCONNECT {
            return Err(ProvisionError::InvalidArgument(format!(
                "connection state {:#04x} is not DISCONNECT",
                value
            )));
        }
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }
        if !wifi.is_available() {
            return Err(ProvisionError::Unavailable);
        }

        wifi.issue_disconnect().map_err(|e| {
            warn!("Disconnect request refused: {}", e);
            ProvisionError::from(e)
        })?;
        info!("Disconnect requested");
        Ok(())
    }

    /// Apply a connect result and return the new state.
    pub fn on_connect_result(&mut self, status: EventStatus) -> ConnectionState {
        self.state = if status.is_success() {
            info!("Connected to {}", self.params.ssid);
            ConnectionState::Connected
        } else {
            warn!(
                "Connection to {} failed ({})",
                self.params.ssid,
                status.code()
            );
            match self.failure_policy {
                ConnectFailurePolicy::MarkDisconnected => ConnectionState::Disconnected,
                ConnectFailurePolicy::MarkConnected => ConnectionState::Connected,
            }
        };
        self.state
    }

    /// Apply a disconnect result. Always ends Disconnected.
    pub fn on_disconnect_result(&mut self, status: EventStatus) -> ConnectionState {
        if self.state == ConnectionState::Connecting {
            info!(
                "Disconnect during connect {} ({})",
                if status.is_success() { "done" } else { "failed" },
                status.code()
            );
        } else {
            info!("Disconnected");
        }
        self.state = ConnectionState::Disconnected;
        self.state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn ap_parameters(&self) -> &ApParameters {
        &self.params
    }

    pub fn failure_policy(&self) -> ConnectFailurePolicy {
        self.failure_policy
    }
}
