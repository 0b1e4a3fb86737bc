//! BLE GATT layout of the provisioning services.
//!
//! The layout tables here are plain data so they can be checked on the host.
//! The NimBLE server that registers them lives in [`gatt`] (ESP32 only).
//!
//! # GATT Service Structure
//!
//! ```text
//! Service: Wi-Fi Scan (fb8c0001-...)
//! ├── Scanning Mode (Read, Write, Notify) + Valid Range
//! ├── AP Count (Read) + Presentation Format
//! └── AP Details (Read) + Presentation Format
//!
//! Service: Wi-Fi Connect (77880001-...)
//! ├── Connection State (Read, Write, Notify) + Presentation Format
//! └── AP Parameters (Read, Write; encrypted + authenticated) + Presentation Format
//! ```
//!
//! Every characteristic also carries a user description.

#[cfg(feature = "esp32")]
mod gatt;

#[cfg(feature = "esp32")]
pub use gatt::{start_advertising, GattError, GattServer};

use crate::provision::{Attribute, ScanState};

/// Wi-Fi scan service.
pub const SCAN_SERVICE_UUID: &str = "fb8c0001-d224-11e4-85a1-0002a5d5c51b";
pub const SCANNING_MODE_UUID: &str = "fb8c0002-d224-11e4-85a1-0002a5d5c51b";
pub const AP_COUNT_UUID: &str = "fb8c0003-d224-11e4-85a1-0002a5d5c51b";
pub const AP_DETAILS_UUID: &str = "fb8c0004-d224-11e4-85a1-0002a5d5c51b";

/// Wi-Fi connect service.
pub const CONNECT_SERVICE_UUID: &str = "77880001-d229-11e4-8689-0002a5d5c51b";
pub const CONNECTION_STATE_UUID: &str = "77880002-d229-11e4-8689-0002a5d5c51b";
pub const AP_PARAMETERS_UUID: &str = "77880003-d229-11e4-8689-0002a5d5c51b";

/// Characteristic User Description descriptor.
pub const CUD_UUID16: u16 = 0x2901;
/// Characteristic Presentation Format descriptor.
pub const CPF_UUID16: u16 = 0x2904;
/// Valid Range descriptor.
pub const VALID_RANGE_UUID16: u16 = 0x2906;

const FORMAT_UINT8: u8 = 0x04;
const FORMAT_STRUCT: u8 = 0x1B;
const UNIT_UNITLESS: u16 = 0x2700;
const NAMESPACE_BT_SIG: u8 = 0x01;
const DESCRIPTION_UNKNOWN: u16 = 0x0000;

/// Which of the two GATT services a characteristic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Scan,
    Connect,
}

impl ServiceKind {
    pub fn uuid(self) -> &'static str {
        match self {
            Self::Scan => SCAN_SERVICE_UUID,
            Self::Connect => CONNECT_SERVICE_UUID,
        }
    }
}

/// Characteristic Presentation Format value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationFormat {
    pub format: u8,
    pub exponent: i8,
    pub unit: u16,
    pub namespace: u8,
    pub description: u16,
}

impl PresentationFormat {
    const fn unitless(format: u8) -> Self {
        Self {
            format,
            exponent: 0,
            unit: UNIT_UNITLESS,
            namespace: NAMESPACE_BT_SIG,
            description: DESCRIPTION_UNKNOWN,
        }
    }

    /// Descriptor value as sent over the air.
    pub fn to_bytes(&self) -> [u8; 7] {
        let unit = self.unit.to_le_bytes();
        let description = self.description.to_le_bytes();
        [
            self.format,
            self.exponent as u8,
            unit[0],
            unit[1],
            self.namespace,
            description[0],
            description[1],
        ]
    }
}

/// Everything the GATT server needs to register one characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicLayout {
    pub attribute: Attribute,
    pub service: ServiceKind,
    pub uuid: &'static str,
    pub user_description: &'static str,
    pub format: Option<PresentationFormat>,
    pub valid_range: Option<[u8; 4]>,
}

impl CharacteristicLayout {
    pub fn notifies(&self) -> bool {
        self.attribute.notifier().is_some()
    }

    pub fn writable(&self) -> bool {
        self.attribute.is_writable()
    }

    pub fn secure(&self) -> bool {
        self.attribute.requires_secure_link()
    }
}

/// Scanning-mode valid range: two little-endian u16s, Idle..=Done.
///
/// Older firmware advertised `[0, AP_DETAILS_MAX_LEN - 1]` here, which is
/// not a scanning-mode value; this range covers the states actually written.
pub fn scanning_mode_range() -> [u8; 4] {
    let min = (ScanState::Idle.as_u8() as u16).to_le_bytes();
    let max = (ScanState::Done.as_u8() as u16).to_le_bytes();
    [min[0], min[1], max[0], max[1]]
}

/// Layout of a single attribute.
pub fn layout(attribute: Attribute) -> CharacteristicLayout {
    let (service, uuid, user_description, format, valid_range) = match attribute {
        Attribute::ScanningMode => (
            ServiceKind::Scan,
            SCANNING_MODE_UUID,
            "Scanning Mode",
            None,
            Some(scanning_mode_range()),
        ),
        Attribute::ApCount => (
            ServiceKind::Scan,
            AP_COUNT_UUID,
            "AP Count",
            Some(PresentationFormat::unitless(FORMAT_UINT8)),
            None,
        ),
        Attribute::ApDetails => (
            ServiceKind::Scan,
            AP_DETAILS_UUID,
            "AP Details",
            Some(PresentationFormat::unitless(FORMAT_STRUCT)),
            None,
        ),
        Attribute::ConnectionState => (
            ServiceKind::Connect,
            CONNECTION_STATE_UUID,
            "Connection State",
            Some(PresentationFormat::unitless(FORMAT_UINT8)),
            None,
        ),
        Attribute::ApParameters => (
            ServiceKind::Connect,
            AP_PARAMETERS_UUID,
            "AP Parameters",
            Some(PresentationFormat::unitless(FORMAT_STRUCT)),
            None,
        ),
    };
    CharacteristicLayout {
        attribute,
        service,
        uuid,
        user_description,
        format,
        valid_range,
    }
}

/// Layouts of every characteristic, in registration order.
pub fn layouts() -> impl Iterator<Item = CharacteristicLayout> {
    Attribute::ALL.into_iter().map(layout)
}

/// Map a characteristic UUID back to its attribute.
pub fn attribute_for_uuid(uuid: &str) -> Option<Attribute> {
    layouts()
        .find(|l| l.uuid.eq_ignore_ascii_case(uuid))
        .map(|l| l.attribute)
}
