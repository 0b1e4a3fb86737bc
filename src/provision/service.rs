//! Provisioning service: the attribute-level surface seen by the BLE
//! transport, and the event entry point used by the network layer.
//!
//! # Attributes
//!
//! ```text
//! Scan service
//! ├── Scanning Mode   (Read, Write, Notify) - 1 byte ScanState, write START_SCAN
//! ├── AP Count        (Read)                - 1 byte
//! └── AP Details      (Read)                - capacity × 37-byte records
//! Connect service
//! ├── Connection State (Read, Write, Notify) - 1 byte, write DISCONNECT
//! └── AP Parameters    (Read, Write; authenticated + encrypted) - 98 bytes
//! ```
//!
//! # Locking
//!
//! Each coordinator has its own mutex; reads, writes and event handlers for
//! a coordinator all run under it. Notifications are sent while that lock is
//! held so they come out in state order. Lock order is coordinator, then the
//! gateway's sink lock; the sink must never call back into the service, nor
//! wait on a lock the transport holds while calling into the service. Such
//! transports deliver through a [`QueuedSink`](super::QueuedSink).

use super::connect::{ConnectCoordinator, ConnectionState};
use super::error::ProvisionError;
use super::event::NetworkEvent;
use super::network::WifiManagement;
use super::notify::{CoordinatorId, NotificationGateway, NotificationSink};
use super::scan::{ScanCoordinator, ScanState};
use super::types::{AccessPointRecord, ApParameters};
use crate::config::ProvisionConfig;
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Attributes exposed to the provisioning peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    ScanningMode,
    ApCount,
    ApDetails,
    ConnectionState,
    ApParameters,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Self::ScanningMode,
        Self::ApCount,
        Self::ApDetails,
        Self::ConnectionState,
        Self::ApParameters,
    ];

    /// Whether reading or writing this attribute needs an authenticated,
    /// encrypted link.
    pub fn requires_secure_link(self) -> bool {
        matches!(self, Self::ApParameters)
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::ScanningMode | Self::ConnectionState | Self::ApParameters
        )
    }

    /// The coordinator whose state this attribute notifies, if any.
    pub fn notifier(self) -> Option<CoordinatorId> {
        match self {
            Self::ScanningMode => Some(CoordinatorId::Scan),
            Self::ConnectionState => Some(CoordinatorId::Connect),
            _ => None,
        }
    }
}

/// Security level of the link a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkSecurity {
    pub encrypted: bool,
    pub authenticated: bool,
}

impl LinkSecurity {
    /// An unpaired, plaintext link.
    pub const OPEN: Self = Self {
        encrypted: false,
        authenticated: false,
    };

    /// A paired link with MITM protection.
    pub const SECURE: Self = Self {
        encrypted: true,
        authenticated: true,
    };

    pub fn is_secure(&self) -> bool {
        self.encrypted && self.authenticated
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Composition of both coordinators, the notification gateway and the
/// network collaborator.
pub struct ProvisioningService {
    scan: Mutex<ScanCoordinator>,
    connect: Mutex<ConnectCoordinator>,
    gateway: NotificationGateway,
    wifi: Arc<dyn WifiManagement>,
}

impl ProvisioningService {
    /// Create the service. `config` is expected to be validated.
    pub fn new(config: &ProvisionConfig, wifi: Arc<dyn WifiManagement>) -> Self {
        Self {
            scan: Mutex::new(ScanCoordinator::new(config.ap_capacity)),
            connect: Mutex::new(ConnectCoordinator::new(config.connect_failure)),
            gateway: NotificationGateway::new(),
            wifi,
        }
    }

    /// Attach the transport's notification sink.
    pub fn attach_sink(&self, sink: Box<dyn NotificationSink>) {
        self.gateway.attach(sink);
    }

    pub fn gateway(&self) -> &NotificationGateway {
        &self.gateway
    }

    /// Read an attribute value.
    pub fn read(&self, attr: Attribute, link: LinkSecurity) -> Result<Vec<u8>, ProvisionError> {
        self.check_link(attr, link)?;
        let value = match attr {
            Attribute::ScanningMode => vec![self.scanning_mode().as_u8()],
            Attribute::ApCount => vec![self.ap_count()],
            Attribute::ApDetails => lock(&self.scan).buffer().encode(),
            Attribute::ConnectionState => vec![self.connection_state().as_u8()],
            Attribute::ApParameters => lock(&self.connect).ap_parameters().to_bytes(),
        };
        Ok(value)
    }

    /// Write an attribute value.
    ///
    /// Returns once the resulting request has been issued; the outcome is
    /// reported later through state reads and notifications.
    pub fn write(
        &self,
        attr: Attribute,
        data: &[u8],
        link: LinkSecurity,
    ) -> Result<(), ProvisionError> {
        if !attr.is_writable() {
            return Err(ProvisionError::NotPermitted);
        }
        self.check_link(attr, link)?;
        let result = match attr {
            Attribute::ScanningMode => {
                let mode = single_byte(data)?;
                lock(&self.scan).request_scan(mode, self.wifi.as_ref())
            }
            Attribute::ConnectionState => {
                let value = single_byte(data)?;
                lock(&self.connect).request_disconnect(value, self.wifi.as_ref())
            }
            Attribute::ApParameters => {
                let params = ApParameters::from_bytes(data)?;
                lock(&self.connect).write_ap_parameters(params, self.wifi.as_ref())
            }
            Attribute::ApCount | Attribute::ApDetails => Err(ProvisionError::NotPermitted),
        };
        if let Err(e) = &result {
            warn!("{:?} write rejected: {}", attr, e);
        }
        result
    }

    /// Enable or disable notifications on a notifying attribute.
    pub fn subscribe(&self, attr: Attribute, enabled: bool) -> Result<(), ProvisionError> {
        let id = attr.notifier().ok_or(ProvisionError::NotPermitted)?;
        self.gateway.set_subscribed(id, enabled);
        Ok(())
    }

    /// Route an event from the network layer to its coordinator.
    pub fn handle_event(&self, event: NetworkEvent) {
        debug!("Network event: {}", event.name());
        match event {
            NetworkEvent::ScanResult(result) => {
                lock(&self.scan).on_scan_result(&result);
            }
            NetworkEvent::ScanDone(status) => {
                let mut scan = lock(&self.scan);
                let state = scan.on_scan_done(status);
                self.gateway.notify(CoordinatorId::Scan, &[state.as_u8()]);
            }
            NetworkEvent::ConnectResult(status) => {
                let mut connect = lock(&self.connect);
                let state = connect.on_connect_result(status);
                self.gateway
                    .notify(CoordinatorId::Connect, &[state.as_u8()]);
            }
            NetworkEvent::DisconnectResult(status) => {
                let mut connect = lock(&self.connect);
                let state = connect.on_disconnect_result(status);
                self.gateway
                    .notify(CoordinatorId::Connect, &[state.as_u8()]);
            }
        }
    }

    pub fn scanning_mode(&self) -> ScanState {
        lock(&self.scan).scanning_mode()
    }

    pub fn ap_count(&self) -> u8 {
        lock(&self.scan).ap_count()
    }

    /// Count and records read under one lock, so they belong to the same scan.
    pub fn ap_snapshot(&self) -> (u8, Vec<AccessPointRecord>) {
        let scan = lock(&self.scan);
        (scan.ap_count(), scan.ap_details())
    }

    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.connect).connection_state()
    }

    fn check_link(&self, attr: Attribute, link: LinkSecurity) -> Result<(), ProvisionError> {
        if attr.requires_secure_link() && !link.is_secure() {
            warn!("{:?} access refused on insecure link", attr);
            return Err(ProvisionError::Unauthorized);
        }
        Ok(())
    }
}

fn single_byte(data: &[u8]) -> Result<u8, ProvisionError> {
    match data {
        [value] => Ok(*value),
        _ => Err(ProvisionError::InvalidArgument(format!(
            "expected 1 byte, got {}",
            data.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectFailurePolicy;
    use crate::provision::connect::DISCONNECT;
    use crate::provision::event::{EventStatus, ScanResult};
    use crate::provision::network::tests::RecordingWifi;
    use crate::provision::network::AuthKind;
    use crate::provision::notify::tests::RecordingSink;
    use crate::provision::scan::START_SCAN;
    use crate::provision::types::{Band, Security, AP_PARAMETERS_LEN, AP_RECORD_LEN};

    struct Harness {
        service: ProvisioningService,
        wifi: Arc<RecordingWifi>,
        sink: RecordingSink,
    }

    fn harness(config: ProvisionConfig) -> Harness {
        let wifi = Arc::new(RecordingWifi::new());
        let service = ProvisioningService::new(&config, wifi.clone());
        let sink = RecordingSink::default();
        service.attach_sink(Box::new(sink.clone()));
        Harness {
            service,
            wifi,
            sink,
        }
    }

    fn default_harness() -> Harness {
        harness(ProvisionConfig::default())
    }

    fn scan_result(name: &str) -> NetworkEvent {
        NetworkEvent::ScanResult(ScanResult::new(name, 1, Band::Band2_4GHz, -40))
    }

    fn params_bytes(security: Security, ssid: &[u8], pass: &[u8]) -> Vec<u8> {
        ApParameters::new(security, ssid, pass).unwrap().to_bytes()
    }

    #[test]
    fn test_initial_reads() {
        let h = default_harness();
        let open = LinkSecurity::OPEN;
        assert_eq!(h.service.read(Attribute::ScanningMode, open), Ok(vec![0x00]));
        assert_eq!(h.service.read(Attribute::ApCount, open), Ok(vec![0]));
        assert_eq!(
            h.service.read(Attribute::ApDetails, open).unwrap().len(),
            15 * AP_RECORD_LEN
        );
        assert_eq!(h.service.read(Attribute::ConnectionState, open), Ok(vec![0x00]));
        assert_eq!(
            h.service
                .read(Attribute::ApParameters, LinkSecurity::SECURE)
                .unwrap(),
            vec![0u8; AP_PARAMETERS_LEN]
        );
    }

    #[test]
    fn test_scan_scenario_with_notification() {
        let h = default_harness();
        h.service.subscribe(Attribute::ScanningMode, true).unwrap();
        h.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();
        assert_eq!(h.service.ap_count(), 0);

        for name in ["a", "b", "c"] {
            h.service.handle_event(scan_result(name));
        }
        h.service
            .handle_event(NetworkEvent::ScanDone(EventStatus::SUCCESS));

        assert_eq!(
            h.service.read(Attribute::ApCount, LinkSecurity::OPEN),
            Ok(vec![3])
        );
        assert_eq!(
            h.service.read(Attribute::ScanningMode, LinkSecurity::OPEN),
            Ok(vec![ScanState::Done.as_u8()])
        );
        assert_eq!(
            h.sink.take(),
            vec![(CoordinatorId::Scan, vec![ScanState::Done.as_u8()])]
        );
    }

    #[test]
    fn test_capacity_two_drops_third_result() {
        let h = harness(ProvisionConfig::default().with_ap_capacity(2));
        h.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();
        for name in ["a", "b", "c"] {
            h.service.handle_event(scan_result(name));
        }
        let (count, records) = h.service.ap_snapshot();
        assert_eq!(count, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].ssid.as_bytes(), b"b");
    }

    #[test]
    fn test_scan_busy_leaves_buffer_untouched() {
        let h = default_harness();
        h.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();
        h.service.handle_event(scan_result("a"));
        let before = h.service.read(Attribute::ApDetails, LinkSecurity::OPEN);

        assert_eq!(
            h.service
                .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN),
            Err(ProvisionError::Busy)
        );
        assert_eq!(h.service.read(Attribute::ApDetails, LinkSecurity::OPEN), before);
        assert_eq!(h.service.scanning_mode(), ScanState::Running);
        assert_eq!(h.wifi.scan_calls(), 1);
    }

    #[test]
    fn test_sentinel_writes_must_be_one_byte() {
        let h = default_harness();
        for data in [&[][..], &[START_SCAN, 0][..]] {
            assert!(matches!(
                h.service
                    .write(Attribute::ScanningMode, data, LinkSecurity::OPEN),
                Err(ProvisionError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            h.service
                .write(Attribute::ConnectionState, &[], LinkSecurity::OPEN),
            Err(ProvisionError::InvalidArgument(_))
        ));
        assert_eq!(h.wifi.scan_calls(), 0);
    }

    #[test]
    fn test_connect_scenario() {
        let h = default_harness();
        h.service
            .write(
                Attribute::ApParameters,
                &params_bytes(Security::WpaPsk, b"net", b"secret12"),
                LinkSecurity::SECURE,
            )
            .unwrap();
        assert_eq!(h.service.connection_state(), ConnectionState::Connecting);

        let requests = h.wifi.connect_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].ssid.as_bytes(), b"net");
        assert_eq!(
            requests[0].passphrase.as_ref().unwrap().as_bytes(),
            b"secret12"
        );
        assert_eq!(requests[0].auth, AuthKind::Psk);

        let again = h.service.write(
            Attribute::ApParameters,
            &params_bytes(Security::WpaPsk, b"other", b"secret12"),
            LinkSecurity::SECURE,
        );
        assert_eq!(again, Err(ProvisionError::Busy));
        let stored = h
            .service
            .read(Attribute::ApParameters, LinkSecurity::SECURE)
            .unwrap();
        assert_eq!(stored, params_bytes(Security::WpaPsk, b"net", b"secret12"));
    }

    #[test]
    fn test_open_network_forwards_no_passphrase() {
        let h = default_harness();
        h.service
            .write(
                Attribute::ApParameters,
                &params_bytes(Security::None, b"cafe", b""),
                LinkSecurity::SECURE,
            )
            .unwrap();
        let requests = h.wifi.connect_requests();
        assert_eq!(requests[0].auth, AuthKind::Open);
        assert!(requests[0].passphrase.is_none());
    }

    #[test]
    fn test_ap_parameters_require_secure_link() {
        let h = default_harness();
        let bytes = params_bytes(Security::WpaPsk, b"net", b"secret12");
        let insecure = [
            LinkSecurity::OPEN,
            LinkSecurity {
                encrypted: true,
                authenticated: false,
            },
        ];
        for link in insecure {
            assert_eq!(
                h.service.read(Attribute::ApParameters, link),
                Err(ProvisionError::Unauthorized)
            );
            assert_eq!(
                h.service.write(Attribute::ApParameters, &bytes, link),
                Err(ProvisionError::Unauthorized)
            );
        }
        assert!(h.wifi.connect_requests().is_empty());
    }

    #[test]
    fn test_malformed_parameters_rejected() {
        let h = default_harness();
        let result = h.service.write(
            Attribute::ApParameters,
            &[9, 3, b'n', b'e', b't'],
            LinkSecurity::SECURE,
        );
        assert!(matches!(result, Err(ProvisionError::InvalidArgument(_))));
        assert_eq!(h.service.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_read_only_attributes() {
        let h = default_harness();
        for attr in [Attribute::ApCount, Attribute::ApDetails] {
            assert_eq!(
                h.service.write(attr, &[0], LinkSecurity::SECURE),
                Err(ProvisionError::NotPermitted)
            );
            assert_eq!(
                h.service.subscribe(attr, true),
                Err(ProvisionError::NotPermitted)
            );
        }
        assert_eq!(
            h.service.subscribe(Attribute::ApParameters, true),
            Err(ProvisionError::NotPermitted)
        );
    }

    #[test]
    fn test_disconnect_when_disconnected_issues_nothing() {
        let h = default_harness();
        h.service
            .write(Attribute::ConnectionState, &[DISCONNECT], LinkSecurity::OPEN)
            .unwrap();
        assert_eq!(h.wifi.disconnect_calls(), 0);
    }

    #[test]
    fn test_connect_notifications_once_per_event() {
        let h = default_harness();
        h.service
            .subscribe(Attribute::ConnectionState, true)
            .unwrap();
        h.service
            .write(
                Attribute::ApParameters,
                &params_bytes(Security::WpaPsk, b"net", b"secret12"),
                LinkSecurity::SECURE,
            )
            .unwrap();
        // Accepting the write does not notify; only results do.
        assert!(h.sink.take().is_empty());

        h.service
            .handle_event(NetworkEvent::ConnectResult(EventStatus::SUCCESS));
        h.service
            .write(Attribute::ConnectionState, &[DISCONNECT], LinkSecurity::OPEN)
            .unwrap();
        h.service
            .handle_event(NetworkEvent::DisconnectResult(EventStatus::SUCCESS));

        assert_eq!(
            h.sink.take(),
            vec![
                (CoordinatorId::Connect, vec![ConnectionState::Connected.as_u8()]),
                (
                    CoordinatorId::Connect,
                    vec![ConnectionState::Disconnected.as_u8()]
                ),
            ]
        );
        assert_eq!(h.wifi.disconnect_calls(), 1);
    }

    #[test]
    fn test_no_notifications_when_unsubscribed() {
        let h = default_harness();
        h.service.subscribe(Attribute::ScanningMode, true).unwrap();
        h.service.subscribe(Attribute::ScanningMode, false).unwrap();
        h.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();
        h.service
            .handle_event(NetworkEvent::ScanDone(EventStatus::SUCCESS));
        h.service
            .handle_event(NetworkEvent::ConnectResult(EventStatus::SUCCESS));
        assert!(h.sink.take().is_empty());
    }

    #[test]
    fn test_scan_results_do_not_notify() {
        let h = default_harness();
        h.service.subscribe(Attribute::ScanningMode, true).unwrap();
        h.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();
        h.service.handle_event(scan_result("a"));
        assert!(h.sink.take().is_empty());
    }

    #[test]
    fn test_failure_policy_is_applied() {
        let h = harness(
            ProvisionConfig::default().with_connect_failure(ConnectFailurePolicy::MarkConnected),
        );
        h.service
            .write(
                Attribute::ApParameters,
                &params_bytes(Security::WpaPsk, b"net", b"secret12"),
                LinkSecurity::SECURE,
            )
            .unwrap();
        h.service
            .handle_event(NetworkEvent::ConnectResult(EventStatus::failure(-1)));
        assert_eq!(h.service.connection_state(), ConnectionState::Connected);
    }

    #[test]
    fn test_coordinators_are_independent() {
        let h = default_harness();
        h.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();
        h.service
            .write(
                Attribute::ApParameters,
                &params_bytes(Security::WpaPsk, b"net", b"secret12"),
                LinkSecurity::SECURE,
            )
            .unwrap();
        assert_eq!(h.service.scanning_mode(), ScanState::Running);
        assert_eq!(h.service.connection_state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_concurrent_results_and_reads() {
        let h = harness(ProvisionConfig::default().with_ap_capacity(255));
        let service = Arc::new(h.service);
        service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();

        let producer = {
            let service = service.clone();
            std::thread::spawn(move || {
                for i in 0..300u32 {
                    service.handle_event(scan_result(&format!("ap{}", i)));
                }
                service.handle_event(NetworkEvent::ScanDone(EventStatus::SUCCESS));
            })
        };

        while service.scanning_mode() != ScanState::Done {
            let (count, records) = service.ap_snapshot();
            assert!(count as usize <= records.len());
            for record in &records[..count as usize] {
                assert!(!record.ssid.is_empty());
            }
        }
        producer.join().unwrap();
        assert_eq!(service.ap_count(), 255);
    }

    #[test]
    fn test_argument_checked_before_busy_before_unavailable() {
        let h = default_harness();
        h.service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();
        h.service
            .write(
                Attribute::ApParameters,
                &params_bytes(Security::WpaPsk, b"net", b"password"),
                LinkSecurity::SECURE,
            )
            .unwrap();
        h.wifi.set_available(false);

        // Malformed payloads fail on their own, even while both are busy.
        assert!(matches!(
            h.service
                .write(Attribute::ScanningMode, &[0x02], LinkSecurity::OPEN),
            Err(ProvisionError::InvalidArgument(_))
        ));
        assert!(matches!(
            h.service.write(
                Attribute::ApParameters,
                &[9, 3, b'n', b'e', b't'],
                LinkSecurity::SECURE
            ),
            Err(ProvisionError::InvalidArgument(_))
        ));

        // Well-formed requests report Busy, not the missing interface.
        assert_eq!(
            h.service
                .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN),
            Err(ProvisionError::Busy)
        );
        assert_eq!(
            h.service.write(
                Attribute::ApParameters,
                &params_bytes(Security::WpaPsk, b"other", b"password"),
                LinkSecurity::SECURE
            ),
            Err(ProvisionError::Busy)
        );
        assert_eq!(h.wifi.scan_calls(), 1);
        assert_eq!(h.wifi.connect_requests().len(), 1);
    }

    #[test]
    fn test_result_event_does_not_wait_for_transport_lock() {
        use crate::provision::notify::tests::{wait_for, BlockingSink};
        use crate::provision::notify::QueuedSink;
        use std::sync::mpsc;
        use std::time::Duration;

        let wifi = Arc::new(RecordingWifi::new());
        let service = Arc::new(ProvisioningService::new(
            &ProvisionConfig::default(),
            wifi.clone(),
        ));
        let transport = Arc::new(Mutex::new(()));
        let sink = RecordingSink::default();
        service.attach_sink(Box::new(
            QueuedSink::spawn(BlockingSink {
                transport: transport.clone(),
                inner: sink.clone(),
            })
            .unwrap(),
        ));
        service.subscribe(Attribute::ScanningMode, true).unwrap();
        service
            .write(Attribute::ScanningMode, &[START_SCAN], LinkSecurity::OPEN)
            .unwrap();

        // The transport holds its own lock while a read callback runs.
        let held = transport.lock().unwrap();
        let (done_tx, done_rx) = mpsc::channel();
        let events = {
            let service = service.clone();
            std::thread::spawn(move || {
                service.handle_event(NetworkEvent::ScanDone(EventStatus::SUCCESS));
                done_tx.send(()).unwrap();
            })
        };
        service
            .read(Attribute::ScanningMode, LinkSecurity::OPEN)
            .unwrap();
        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("scan done blocked on the transport lock");
        events.join().unwrap();
        assert_eq!(service.scanning_mode(), ScanState::Done);

        drop(held);
        assert_eq!(
            wait_for(&sink, 1),
            vec![(CoordinatorId::Scan, vec![ScanState::Done.as_u8()])]
        );
    }
}
