//! Wi-Fi provisioning firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== Wi-Fi provisioning starting ===");

    if let Err(e) = firmware::run() {
        log::error!("Provisioning stopped: {}", e);
    }
}

#[cfg(feature = "esp32")]
mod firmware {
    use esp32_nimble::enums::{AuthReq, SecurityIOCap};
    use esp32_nimble::BLEDevice;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;
    use std::sync::Arc;
    use wifi_provision_esp32::ble::{start_advertising, GattServer};
    use wifi_provision_esp32::config::ProvisionConfig;
    use wifi_provision_esp32::provision::ProvisioningService;
    use wifi_provision_esp32::wifi::EspWifiManagement;

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let config = ProvisionConfig::default();
        config.validate()?;

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
        let wifi = EspWifiManagement::new(peripherals.modem, sysloop, Some(nvs), events_tx)?;
        let service = Arc::new(ProvisioningService::new(&config, Arc::new(wifi)));

        let device = BLEDevice::take();
        // AP parameters need an authenticated link; the peer confirms the
        // passkey NimBLE displays.
        device
            .security()
            .set_auth(AuthReq::all())
            .set_io_cap(SecurityIOCap::DisplayOnly);

        let server = device.get_server();
        server.on_connect(|_server, desc| info!("Central connected: {:?}", desc.address()));
        server.on_disconnect(|_desc, reason| info!("Central disconnected ({:?})", reason));

        let gatt = GattServer::register(server, service.clone())?;
        service.attach_sink(Box::new(gatt.notifier()?));
        start_advertising(&config.device_name)?;

        info!("Entering event loop...");
        while let Some(event) = events_rx.blocking_recv() {
            service.handle_event(event);
        }
        Ok(())
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-sim' to simulate a provisioning session on the host.");
}
