//! ESP-IDF station driver behind [`WifiManagement`].
//!
//! Requests are issued without blocking. Outcomes come back through the
//! system event loop and are forwarded as [`NetworkEvent`]s on a channel;
//! the firmware main loop feeds them to the provisioning service.

use crate::provision::{
    scan_done_events, AuthKind, Band, ConnectRequest, NetworkError, NetworkEvent, ScanResult,
    StationTracker, WifiManagement,
};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointInfo, AuthMethod, ClientConfiguration, Configuration, EspWifi, ScanConfig,
    WifiEvent,
};
use esp_idf_sys::EspError;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

fn lock<'a>(wifi: &'a Mutex<EspWifi<'static>>) -> MutexGuard<'a, EspWifi<'static>> {
    wifi.lock().unwrap_or_else(PoisonError::into_inner)
}

fn driver_error(e: EspError) -> NetworkError {
    NetworkError::Rejected { code: e.code() }
}

fn to_scan_result(ap: &AccessPointInfo) -> ScanResult {
    ScanResult::new(
        ap.ssid.as_bytes(),
        ap.channel,
        Band::from_channel(ap.channel),
        ap.signal_strength,
    )
}

/// Station-mode Wi-Fi driver.
pub struct EspWifiManagement {
    wifi: Arc<Mutex<EspWifi<'static>>>,
    station: Arc<StationTracker>,
    _subscription: EspSubscription<'static, System>,
}

impl EspWifiManagement {
    /// Start the station interface and forward its events to `events`.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        events: UnboundedSender<NetworkEvent>,
    ) -> Result<Self, EspError> {
        let mut wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        info!("Wi-Fi station started");

        let wifi = Arc::new(Mutex::new(wifi));
        let station = Arc::new(StationTracker::new());

        let subscription = {
            let wifi = wifi.clone();
            let station = station.clone();
            sysloop.subscribe::<WifiEvent, _>(move |event| {
                forward(&event, &wifi, &station, &events);
            })?
        };

        Ok(Self {
            wifi,
            station,
            _subscription: subscription,
        })
    }
}

fn forward(
    event: &WifiEvent,
    wifi: &Mutex<EspWifi<'static>>,
    station: &StationTracker,
    events: &UnboundedSender<NetworkEvent>,
) {
    let outgoing = match event {
        WifiEvent::ScanDone(done) => {
            let results = lock(wifi).get_scan_result().map_err(|e| {
                warn!("Reading scan results failed: {:?}", e);
                e.code()
            });
            if !done.is_successful() {
                warn!("Radio reported scan {} as failed", done.id());
            }
            let results = results.map(|aps| {
                debug!("Scan returned {} APs", aps.len());
                aps.iter().map(to_scan_result).collect()
            });
            scan_done_events(done.is_successful(), results)
        }
        WifiEvent::StaConnected(_) => vec![station.on_connected()],
        WifiEvent::StaDisconnected(link) => {
            debug!("Station dropped, reason {}", link.reason());
            station.on_disconnected().into_iter().collect()
        }
        _ => return,
    };

    for event in outgoing {
        if events.send(event).is_err() {
            warn!("Network event dropped: receiver closed");
            return;
        }
    }
}

impl WifiManagement for EspWifiManagement {
    fn is_available(&self) -> bool {
        lock(&self.wifi).is_started().unwrap_or(false)
    }

    fn issue_scan(&self) -> Result<(), NetworkError> {
        lock(&self.wifi)
            .start_scan(&ScanConfig::default(), false)
            .map_err(driver_error)
    }

    fn issue_connect(&self, request: &ConnectRequest) -> Result<(), NetworkError> {
        let ssid = std::str::from_utf8(request.ssid.as_bytes())
            .ok()
            .and_then(|s| s.try_into().ok())
            .ok_or(NetworkError::InvalidSsid)?;

        let (auth_method, password) = match (&request.auth, &request.passphrase) {
            (AuthKind::Open, _) => (AuthMethod::None, Default::default()),
            (AuthKind::Psk, Some(passphrase)) => {
                let password = std::str::from_utf8(passphrase.as_bytes())
                    .ok()
                    .and_then(|s| s.try_into().ok())
                    .ok_or(NetworkError::InvalidPassphrase)?;
                (AuthMethod::WPA2Personal, password)
            }
            (AuthKind::Psk, None) => return Err(NetworkError::InvalidPassphrase),
        };

        let config = Configuration::Client(ClientConfiguration {
            ssid,
            password,
            auth_method,
            ..Default::default()
        });

        let mut wifi = lock(&self.wifi);

        // Drop the current link first so its disconnect event is known to
        // be ours and is not taken as the new attempt failing.
        if wifi.is_connected().unwrap_or(false) {
            info!("Leaving current AP before re-targeting");
            self.station.expect_drop();
            if let Err(e) = wifi.disconnect() {
                self.station.cancel_expected_drop();
                return Err(driver_error(e));
            }
        }

        wifi.set_configuration(&config).map_err(driver_error)?;
        self.station.begin_connect();
        wifi.connect().map_err(|e| {
            self.station.abort_connect();
            driver_error(e)
        })
    }

    fn issue_disconnect(&self) -> Result<(), NetworkError> {
        self.station.begin_disconnect();
        lock(&self.wifi).disconnect().map_err(driver_error)
    }
}
