//! Simulated network-management layer for host builds.
//!
//! [`SimulatedWifi`] answers scan, connect and disconnect requests from a
//! fixed list of access points. Results are produced on the tokio runtime
//! after a delay and delivered over a channel, so they reach the service
//! from a different task than the request, as they would from a radio.
//!
//! # Example
//!
//! ```ignore
//! let (wifi, events) = SimulatedWifi::new(aps, Duration::from_millis(200), Handle::current());
//! let service = Arc::new(ProvisioningService::new(&config, Arc::new(wifi)));
//! let cancel = CancellationToken::new();
//! let pump = spawn_event_pump(service.clone(), events, cancel.clone());
//! ```

use crate::provision::{
    AuthKind, Band, ConnectRequest, CoordinatorId, EventStatus, NetworkError, NetworkEvent,
    NotificationSink, ProvisioningService, ScanResult, WifiManagement,
};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Status reported when the passphrase does not match.
pub const STATUS_AUTH_FAILED: i32 = -13;

/// Status reported when the SSID is not in range.
pub const STATUS_NOT_FOUND: i32 = -2;

/// An access point the simulator pretends to see.
#[derive(Debug, Clone)]
pub struct SimulatedAp {
    pub ssid: String,
    pub channel: u8,
    pub rssi: i8,
    /// `None` for an open network.
    pub passphrase: Option<String>,
}

impl SimulatedAp {
    pub fn open(ssid: impl Into<String>, channel: u8, rssi: i8) -> Self {
        Self {
            ssid: ssid.into(),
            channel,
            rssi,
            passphrase: None,
        }
    }

    pub fn secured(
        ssid: impl Into<String>,
        channel: u8,
        rssi: i8,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            channel,
            rssi,
            passphrase: Some(passphrase.into()),
        }
    }

    fn accepts(&self, request: &ConnectRequest) -> bool {
        match (&self.passphrase, request.auth, &request.passphrase) {
            (None, _, _) => true,
            (Some(expected), AuthKind::Psk, Some(given)) => expected.as_bytes() == given.as_bytes(),
            _ => false,
        }
    }
}

/// Host stand-in for the radio's management interface.
pub struct SimulatedWifi {
    aps: Vec<SimulatedAp>,
    delay: Duration,
    available: AtomicBool,
    events: mpsc::UnboundedSender<NetworkEvent>,
    runtime: Handle,
}

impl SimulatedWifi {
    /// Create a simulator and the receiving end of its event channel.
    pub fn new(
        aps: Vec<SimulatedAp>,
        delay: Duration,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<NetworkEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let wifi = Self {
            aps,
            delay,
            available: AtomicBool::new(true),
            events,
            runtime,
        };
        (wifi, rx)
    }

    /// Simulate the station interface going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn send_later(&self, events: Vec<NetworkEvent>) {
        let tx = self.events.clone();
        let delay = self.delay;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            for event in events {
                if tx.send(event).is_err() {
                    debug!("Event channel closed");
                    break;
                }
            }
        });
    }

    fn check_available(&self) -> Result<(), NetworkError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(NetworkError::NoInterface)
        }
    }
}

impl WifiManagement for SimulatedWifi {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn issue_scan(&self) -> Result<(), NetworkError> {
        self.check_available()?;
        let mut events: Vec<NetworkEvent> = self
            .aps
            .iter()
            .map(|ap| {
                NetworkEvent::ScanResult(ScanResult::new(
                    ap.ssid.as_bytes(),
                    ap.channel,
                    Band::from_channel(ap.channel),
                    ap.rssi,
                ))
            })
            .collect();
        events.push(NetworkEvent::ScanDone(EventStatus::SUCCESS));
        info!("[sim] scanning, {} APs in range", self.aps.len());
        self.send_later(events);
        Ok(())
    }

    fn issue_connect(&self, request: &ConnectRequest) -> Result<(), NetworkError> {
        self.check_available()?;
        let status = match self
            .aps
            .iter()
            .find(|ap| ap.ssid.as_bytes() == request.ssid.as_bytes())
        {
            Some(ap) if ap.accepts(request) => EventStatus::SUCCESS,
            Some(_) => EventStatus::failure(STATUS_AUTH_FAILED),
            None => EventStatus::failure(STATUS_NOT_FOUND),
        };
        info!("[sim] connecting to {} ({:?})", request.ssid, request.auth);
        self.send_later(vec![NetworkEvent::ConnectResult(status)]);
        Ok(())
    }

    fn issue_disconnect(&self) -> Result<(), NetworkError> {
        self.check_available()?;
        info!("[sim] disconnecting");
        self.send_later(vec![NetworkEvent::DisconnectResult(EventStatus::SUCCESS)]);
        Ok(())
    }
}

/// Forward simulator events into `service` until cancelled or the channel
/// closes.
pub fn spawn_event_pump(
    service: Arc<ProvisioningService>,
    mut events: mpsc::UnboundedReceiver<NetworkEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Event pump cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => service.handle_event(event),
                    None => break,
                },
            }
        }
    })
}

/// Notification sink that forwards to a tokio channel.
pub struct ChannelSink(pub mpsc::UnboundedSender<(CoordinatorId, Vec<u8>)>);

impl NotificationSink for ChannelSink {
    fn deliver(&self, id: CoordinatorId, payload: &[u8]) {
        let _ = self.0.send((id, payload.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvisionConfig;
    use crate::provision::{
        ApParameters, Attribute, ConnectionState, LinkSecurity, ProvisionError, ScanState,
        Security, START_SCAN,
    };
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    struct Rig {
        service: Arc<ProvisioningService>,
        wifi: Arc<SimulatedWifi>,
        notifications: mpsc::UnboundedReceiver<(CoordinatorId, Vec<u8>)>,
        cancel: CancellationToken,
        pump: JoinHandle<()>,
    }

    fn rig(config: ProvisionConfig) -> Rig {
        let aps = vec![
            SimulatedAp::secured("home", 6, -48, "correct horse"),
            SimulatedAp::open("cafe", 11, -70),
            SimulatedAp::secured("lab-5g", 36, -60, "battery staple"),
        ];
        let (wifi, events) = SimulatedWifi::new(aps, Duration::from_millis(5), Handle::current());
        let wifi = Arc::new(wifi);
        let service = Arc::new(ProvisioningService::new(&config, wifi.clone()));
        let (tx, notifications) = mpsc::unbounded_channel();
        service.attach_sink(Box::new(ChannelSink(tx)));
        let cancel = CancellationToken::new();
        let pump = spawn_event_pump(service.clone(), events, cancel.clone());
        Rig {
            service,
            wifi,
            notifications,
            cancel,
            pump,
        }
    }

    async fn next(rig: &mut Rig) -> (CoordinatorId, Vec<u8>) {
        timeout(WAIT, rig.notifications.recv())
            .await
            .expect("notification timed out")
            .expect("sink closed")
    }

    fn connect(rig: &Rig, ssid: &[u8], pass: &[u8]) -> Result<(), ProvisionError> {
        let security = if pass.is_empty() {
            Security::None
        } else {
            Security::WpaPsk
        };
        let bytes = ApParameters::new(security, ssid, pass).unwrap().to_bytes();
        rig.service
            .write(Attribute::ApParameters, &bytes, LinkSecurity::SECURE)
    }

    #[tokio::test]
    async fn test_scan_reports_all_aps() {
        let mut rig = rig(ProvisionConfig::default());
        rig.service.subscribe(Attribute::ScanningMode, true).unwrap();
        rig.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();

        assert_eq!(next(&mut rig).await, (CoordinatorId::Scan, vec![ScanState::Done.as_u8()]));
        let (count, records) = rig.service.ap_snapshot();
        assert_eq!(count, 3);
        assert_eq!(records[2].ssid.as_bytes(), b"lab-5g");
        assert_eq!(records[2].band, Band::Band5GHz);
        rig.cancel.cancel();
    }

    #[tokio::test]
    async fn test_connect_then_disconnect() {
        let mut rig = rig(ProvisionConfig::default());
        rig.service
            .subscribe(Attribute::ConnectionState, true)
            .unwrap();

        connect(&rig, b"home", b"correct horse").unwrap();
        assert_eq!(connect(&rig, b"cafe", b""), Err(ProvisionError::Busy));
        assert_eq!(
            next(&mut rig).await,
            (CoordinatorId::Connect, vec![ConnectionState::Connected.as_u8()])
        );

        rig.service
            .write(Attribute::ConnectionState, &[0x00], LinkSecurity::OPEN)
            .unwrap();
        assert_eq!(
            next(&mut rig).await,
            (CoordinatorId::Connect, vec![ConnectionState::Disconnected.as_u8()])
        );
        rig.cancel.cancel();
    }

    #[tokio::test]
    async fn test_wrong_passphrase_ends_disconnected() {
        let mut rig = rig(ProvisionConfig::default());
        rig.service
            .subscribe(Attribute::ConnectionState, true)
            .unwrap();
        connect(&rig, b"home", b"wrong password").unwrap();
        assert_eq!(
            next(&mut rig).await,
            (CoordinatorId::Connect, vec![ConnectionState::Disconnected.as_u8()])
        );
        rig.cancel.cancel();
    }

    #[tokio::test]
    async fn test_open_network_connects() {
        let mut rig = rig(ProvisionConfig::default());
        rig.service
            .subscribe(Attribute::ConnectionState, true)
            .unwrap();
        connect(&rig, b"cafe", b"").unwrap();
        assert_eq!(
            next(&mut rig).await.1,
            vec![ConnectionState::Connected.as_u8()]
        );
        rig.cancel.cancel();
    }

    #[tokio::test]
    async fn test_missing_interface_is_unavailable() {
        let rig = rig(ProvisionConfig::default());
        rig.wifi.set_available(false);
        assert_eq!(
            rig.service
                .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN),
            Err(ProvisionError::Unavailable)
        );
        assert_eq!(
            connect(&rig, b"cafe", b""),
            Err(ProvisionError::Unavailable)
        );
        rig.cancel.cancel();
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancel() {
        let rig = rig(ProvisionConfig::default());
        rig.cancel.cancel();
        timeout(WAIT, rig.pump)
            .await
            .expect("pump did not stop")
            .unwrap();
    }
}
