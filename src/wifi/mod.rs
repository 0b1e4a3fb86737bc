//! ESP-IDF Wi-Fi station driver.
//!
//! - [`driver`] - [`EspWifiManagement`], the radio-backed
//!   [`WifiManagement`](crate::provision::WifiManagement)

mod driver;

pub use driver::EspWifiManagement;
