//! NimBLE GATT server for the provisioning services.
//!
//! Every characteristic callback goes straight to [`ProvisioningService`];
//! nothing is cached here. Rejected writes are answered with the ATT code
//! from [`ProvisionError::att_code`](crate::provision::ProvisionError::att_code).

use super::{layouts, CharacteristicLayout, ServiceKind, CPF_UUID16, CUD_UUID16, VALID_RANGE_UUID16};
use crate::provision::{
    Attribute, CoordinatorId, LinkSecurity, NotificationSink, ProvisioningService, QueuedSink,
};
use esp32_nimble::utilities::mutex::Mutex as NimbleMutex;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{
    BLEAdvertisementData, BLECharacteristic, BLEConnDesc, BLEDevice, BLEError, BLEServer,
    DescriptorProperties, NimbleProperties, NimbleSub,
};
use log::{info, warn};
use std::sync::Arc;

type CharHandle = Arc<NimbleMutex<BLECharacteristic>>;

/// Errors raised while registering services or advertising.
#[derive(Debug)]
pub enum GattError {
    /// A UUID string could not be parsed.
    InvalidUuid(&'static str),
    /// The state attribute for a notifier was not registered.
    MissingCharacteristic(Attribute),
    /// NimBLE host error.
    Ble(BLEError),
    /// The notification thread could not be started.
    Thread(std::io::Error),
}

impl From<BLEError> for GattError {
    fn from(e: BLEError) -> Self {
        Self::Ble(e)
    }
}

impl std::fmt::Display for GattError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUuid(uuid) => write!(f, "invalid UUID: {}", uuid),
            Self::MissingCharacteristic(attr) => write!(f, "{:?} not registered", attr),
            Self::Ble(e) => write!(f, "BLE error: {:?}", e),
            Self::Thread(e) => write!(f, "notification thread: {}", e),
        }
    }
}

impl std::error::Error for GattError {}

fn uuid(value: &'static str) -> Result<BleUuid, GattError> {
    BleUuid::from_uuid128_string(value).map_err(|_| GattError::InvalidUuid(value))
}

fn link_of(desc: &BLEConnDesc) -> LinkSecurity {
    LinkSecurity {
        encrypted: desc.encrypted(),
        authenticated: desc.authenticated(),
    }
}

fn properties(layout: &CharacteristicLayout) -> NimbleProperties {
    let mut props = NimbleProperties::READ;
    if layout.writable() {
        props |= NimbleProperties::WRITE;
    }
    if layout.notifies() {
        props |= NimbleProperties::NOTIFY;
    }
    if layout.secure() {
        props |= NimbleProperties::READ_ENC
            | NimbleProperties::READ_AUTHEN
            | NimbleProperties::WRITE_ENC
            | NimbleProperties::WRITE_AUTHEN;
    }
    props
}

/// Registered provisioning characteristics.
pub struct GattServer {
    characteristics: Vec<(Attribute, CharHandle)>,
}

impl GattServer {
    /// Create both services on `server` and bind their characteristics to
    /// `service`.
    pub fn register(
        server: &mut BLEServer,
        service: Arc<ProvisioningService>,
    ) -> Result<Self, GattError> {
        let scan = server.create_service(uuid(ServiceKind::Scan.uuid())?);
        let connect = server.create_service(uuid(ServiceKind::Connect.uuid())?);

        let mut characteristics = Vec::new();
        for layout in layouts() {
            let gatt_service = match layout.service {
                ServiceKind::Scan => &scan,
                ServiceKind::Connect => &connect,
            };
            let chr = gatt_service
                .lock()
                .create_characteristic(uuid(layout.uuid)?, properties(&layout));
            bind(&chr, &layout, &service);
            add_descriptors(&chr, &layout);
            characteristics.push((layout.attribute, chr));
        }

        info!("Registered {} provisioning characteristics", characteristics.len());
        Ok(Self { characteristics })
    }

    fn handle(&self, attr: Attribute) -> Result<CharHandle, GattError> {
        self.characteristics
            .iter()
            .find(|(a, _)| *a == attr)
            .map(|(_, chr)| chr.clone())
            .ok_or(GattError::MissingCharacteristic(attr))
    }

    /// Notification sink pushing state changes to subscribed centrals.
    ///
    /// NimBLE holds the characteristic mutex while read and write callbacks
    /// call into the service, so `set_value`/`notify` run on a separate
    /// thread, never under a coordinator lock.
    pub fn notifier(&self) -> Result<QueuedSink, GattError> {
        let notifier = NimbleNotifier {
            scanning_mode: self.handle(Attribute::ScanningMode)?,
            connection_state: self.handle(Attribute::ConnectionState)?,
        };
        QueuedSink::spawn(notifier).map_err(GattError::Thread)
    }
}

fn bind(chr: &CharHandle, layout: &CharacteristicLayout, service: &Arc<ProvisioningService>) {
    let attr = layout.attribute;

    let reader = service.clone();
    chr.lock().on_read(move |value, desc| {
        match reader.read(attr, link_of(desc)) {
            Ok(bytes) => {
                value.set_value(&bytes);
            }
            Err(e) => warn!("Read of {:?} refused: {}", attr, e),
        }
    });

    if layout.writable() {
        let writer = service.clone();
        chr.lock().on_write(move |args| {
            let link = link_of(args.desc());
            if let Err(e) = writer.write(attr, args.recv_data(), link) {
                args.reject_with_error_code(e.att_code());
            }
        });
    }

    if layout.notifies() {
        let subscriber = service.clone();
        chr.lock().on_subscribe(move |_chr, _desc, sub| {
            let enabled = sub.contains(NimbleSub::NOTIFY);
            if let Err(e) = subscriber.subscribe(attr, enabled) {
                warn!("Subscription to {:?} refused: {}", attr, e);
            }
        });
    }
}

fn add_descriptors(chr: &CharHandle, layout: &CharacteristicLayout) {
    let mut chr = chr.lock();

    chr.create_descriptor(BleUuid::from_uuid16(CUD_UUID16), DescriptorProperties::READ)
        .lock()
        .set_value(layout.user_description.as_bytes());

    if let Some(format) = layout.format {
        chr.create_descriptor(BleUuid::from_uuid16(CPF_UUID16), DescriptorProperties::READ)
            .lock()
            .set_value(&format.to_bytes());
    }

    if let Some(range) = layout.valid_range {
        chr.create_descriptor(
            BleUuid::from_uuid16(VALID_RANGE_UUID16),
            DescriptorProperties::READ,
        )
        .lock()
        .set_value(&range);
    }
}

/// Sends state notifications through the NimBLE characteristics. Only run
/// from the [`QueuedSink`] thread.
struct NimbleNotifier {
    scanning_mode: CharHandle,
    connection_state: CharHandle,
}

impl NotificationSink for NimbleNotifier {
    fn deliver(&self, id: CoordinatorId, payload: &[u8]) {
        let chr = match id {
            CoordinatorId::Scan => &self.scanning_mode,
            CoordinatorId::Connect => &self.connection_state,
        };
        chr.lock().set_value(payload).notify();
    }
}

/// Advertise the scan service, with the device name in the scan response.
///
/// Flags plus a 128-bit UUID leave no room for a useful name in the
/// advertisement itself.
pub fn start_advertising(device_name: &str) -> Result<(), GattError> {
    let device = BLEDevice::take();
    BLEDevice::set_device_name(device_name)?;

    let advertising = device.get_advertising();
    let mut advertising = advertising.lock();
    advertising.set_data(
        BLEAdvertisementData::new().add_service_uuid(uuid(ServiceKind::Scan.uuid())?),
    )?;
    advertising.set_scan_response_data(BLEAdvertisementData::new().name(device_name))?;
    advertising.start()?;

    info!("BLE advertising started as '{}'", device_name);
    Ok(())
}
