//! Host simulation of a provisioning session.
//!
//! Plays the part of a BLE central against the provisioning service, backed
//! by a simulated radio: subscribe, scan, read the results, provision an
//! access point, then disconnect.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin host-sim [config.json]
//! RUST_LOG=debug cargo run --bin host-sim
//! ```

#[cfg(not(target_os = "espidf"))]
fn main() {
    host::main();
}

#[cfg(target_os = "espidf")]
fn main() {
    println!("host-sim runs on the host only.");
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use log::{error, info, warn};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use wifi_provision_esp32::config::host::load_config_from;
    use wifi_provision_esp32::config::ProvisionConfig;
    use wifi_provision_esp32::provision::{
        ApParameters, Attribute, CoordinatorId, LinkSecurity, ProvisionError, ProvisioningService,
        Security, DISCONNECT, START_SCAN,
    };
    use wifi_provision_esp32::sim::{spawn_event_pump, ChannelSink, SimulatedAp, SimulatedWifi};

    const RADIO_DELAY: Duration = Duration::from_millis(300);
    const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

    type Notifications = mpsc::UnboundedReceiver<(CoordinatorId, Vec<u8>)>;

    #[tokio::main]
    pub async fn main() {
        // Initialize logging
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        info!("=== Wi-Fi provisioning host simulation ===");

        let config = match std::env::args().nth(1) {
            Some(path) => match load_config_from(Path::new(&path)) {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to load {}: {}", path, e);
                    std::process::exit(1);
                }
            },
            None => ProvisionConfig::default(),
        };

        let aps = vec![
            SimulatedAp::secured("HomeNetwork", 6, -42, "correct horse battery"),
            SimulatedAp::open("CoffeeShop", 11, -71),
            SimulatedAp::secured("Office-5G", 44, -63, "staple-2024"),
        ];
        let (wifi, events) = SimulatedWifi::new(aps, RADIO_DELAY, Handle::current());
        let service = Arc::new(ProvisioningService::new(&config, Arc::new(wifi)));

        let (tx, mut notifications) = mpsc::unbounded_channel();
        service.attach_sink(Box::new(ChannelSink(tx)));

        let cancel = CancellationToken::new();
        let pump = spawn_event_pump(service.clone(), events, cancel.clone());

        tokio::select! {
            result = session(&service, &mut notifications) => match result {
                Ok(()) => info!("Session complete"),
                Err(e) => error!("Session failed: {}", e),
            },
            _ = tokio::signal::ctrl_c() => warn!("Interrupted"),
        }

        cancel.cancel();
        if let Err(e) = pump.await {
            warn!("Event pump ended abnormally: {}", e);
        }
    }

    async fn session(
        service: &ProvisioningService,
        notifications: &mut Notifications,
    ) -> Result<(), ProvisionError> {
        let secure = LinkSecurity::SECURE;
        service.subscribe(Attribute::ScanningMode, true)?;
        service.subscribe(Attribute::ConnectionState, true)?;

        info!("Central: start scan");
        service.write(Attribute::ScanningMode, &[START_SCAN], secure)?;
        wait_for(notifications, CoordinatorId::Scan).await;

        let (count, records) = service.ap_snapshot();
        info!("Central: {} access points", count);
        for (i, ap) in records.iter().take(count as usize).enumerate() {
            info!(
                "  #{} {} ch {} ({:?}) rssi {}",
                i, ap.ssid, ap.channel, ap.band, ap.rssi
            );
        }

        let params = ApParameters::new(Security::WpaPsk, b"HomeNetwork", b"correct horse battery")?;
        info!("Central: provision {}", params.ssid);
        service.write(Attribute::ApParameters, &params.to_bytes(), secure)?;
        wait_for(notifications, CoordinatorId::Connect).await;
        info!("Connection state: {:?}", service.connection_state());

        info!("Central: disconnect");
        service.write(Attribute::ConnectionState, &[DISCONNECT], secure)?;
        wait_for(notifications, CoordinatorId::Connect).await;
        info!("Connection state: {:?}", service.connection_state());

        Ok(())
    }

    async fn wait_for(notifications: &mut Notifications, id: CoordinatorId) {
        loop {
            match tokio::time::timeout(NOTIFY_TIMEOUT, notifications.recv()).await {
                Ok(Some((got, payload))) => {
                    info!("Notification {:?}: {:02x?}", got, payload);
                    if got == id {
                        return;
                    }
                }
                Ok(None) => return,
                Err(_) => {
                    warn!("No {:?} notification within {:?}", id, NOTIFY_TIMEOUT);
                    return;
                }
            }
        }
    }
}
