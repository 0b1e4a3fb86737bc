//! Value types exchanged over the provisioning attributes.
//!
//! All multi-field values have a fixed little-endian byte layout so that a
//! peer can read them as C structs:
//!
//! ```text
//! AccessPointRecord (37 bytes)
//! [freshness:1][channel:1][band:1][rssi:1][ssid_len:1][ssid:32]
//!
//! ApParameters (98 bytes)
//! [security:1][ssid_len:1][ssid:32][passphrase_len:1][passphrase:63]
//! ```
//!
//! Variable-length fields are zero-padded to their maximum size.

use crate::config::{MAX_PASSPHRASE_LEN, MAX_SSID_LEN, MIN_PSK_LEN};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Encoded size of one [`AccessPointRecord`].
pub const AP_RECORD_LEN: usize = 5 + MAX_SSID_LEN;

/// Encoded size of [`ApParameters`].
pub const AP_PARAMETERS_LEN: usize = 3 + MAX_SSID_LEN + MAX_PASSPHRASE_LEN;

/// Network name, up to 32 arbitrary bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ssid {
    len: u8,
    bytes: [u8; MAX_SSID_LEN],
}

impl Ssid {
    /// Create an SSID. Returns `None` if longer than 32 bytes.
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_SSID_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_SSID_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            len: bytes.len() as u8,
            bytes: buf,
        })
    }

    /// The empty SSID.
    pub const fn empty() -> Self {
        Self {
            len: 0,
            bytes: [0; MAX_SSID_LEN],
        }
    }

    /// SSID bytes (without padding).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Ssid {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ssid({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Network passphrase, up to 63 bytes. Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase {
    len: u8,
    bytes: [u8; MAX_PASSPHRASE_LEN],
}

impl Passphrase {
    /// Create a passphrase. Returns `None` if longer than 63 bytes.
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_PASSPHRASE_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_PASSPHRASE_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            len: bytes.len() as u8,
            bytes: buf,
        })
    }

    /// The empty passphrase.
    pub const fn empty() -> Self {
        Self {
            len: 0,
            bytes: [0; MAX_PASSPHRASE_LEN],
        }
    }

    /// Passphrase bytes (without padding).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Passphrase {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase(<{} bytes>)", self.len)
    }
}

/// Security requested by the peer for the target network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Security {
    /// Open network.
    #[default]
    None = 0,
    /// WPA/WPA2 personal.
    WpaPsk = 1,
    /// Legacy WEP. Forwarded to the radio as a pre-shared key.
    Wep = 2,
}

impl Security {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::WpaPsk),
            2 => Some(Self::Wep),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Frequency band an access point was seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Band {
    #[default]
    Band2_4GHz = 0,
    Band5GHz = 1,
    Band6GHz = 2,
}

impl Band {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Band2_4GHz),
            1 => Some(Self::Band5GHz),
            2 => Some(Self::Band6GHz),
            _ => None,
        }
    }

    /// Guess the band from a channel number. Channels 1-14 are 2.4 GHz,
    /// everything above is treated as 5 GHz (6 GHz channel numbers overlap
    /// and cannot be told apart without the operating class).
    pub fn from_channel(channel: u8) -> Self {
        if channel <= 14 {
            Self::Band2_4GHz
        } else {
            Self::Band5GHz
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// How current a stored AP record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Freshness {
    /// Slot never written.
    #[default]
    None = 0,
    /// Left over from an earlier scan.
    Stale = 1,
    /// Part of the latest scan.
    Current = 2,
}

impl Freshness {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One discovered access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessPointRecord {
    pub freshness: Freshness,
    pub channel: u8,
    pub band: Band,
    pub rssi: i8,
    pub ssid: Ssid,
}

impl AccessPointRecord {
    /// Append the 37-byte encoding of this record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.freshness.as_u8());
        out.push(self.channel);
        out.push(self.band.as_u8());
        out.push(self.rssi as u8);
        out.push(self.ssid.len);
        out.extend_from_slice(&self.ssid.bytes);
    }
}

/// Target network parameters written by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop)]
pub struct ApParameters {
    #[zeroize(skip)]
    pub security: Security,
    #[zeroize(skip)]
    pub ssid: Ssid,
    pub passphrase: Passphrase,
}

impl ApParameters {
    /// Create and validate parameters.
    pub fn new(security: Security, ssid: &[u8], passphrase: &[u8]) -> Result<Self, ParamsError> {
        let ssid = Ssid::new(ssid).ok_or(ParamsError::SsidTooLong { len: ssid.len() })?;
        let passphrase = Passphrase::new(passphrase).ok_or(ParamsError::PassphraseTooLong {
            len: passphrase.len(),
        })?;
        let params = Self {
            security,
            ssid,
            passphrase,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the rules the radio needs to attempt a connection.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.ssid.is_empty() {
            return Err(ParamsError::SsidEmpty);
        }
        match self.security {
            Security::None => {}
            Security::WpaPsk => {
                if self.passphrase.len() < MIN_PSK_LEN {
                    return Err(ParamsError::PassphraseTooShort {
                        len: self.passphrase.len(),
                        min: MIN_PSK_LEN,
                    });
                }
            }
            Security::Wep => {
                if self.passphrase.is_empty() {
                    return Err(ParamsError::PassphraseTooShort { len: 0, min: 1 });
                }
            }
        }
        Ok(())
    }

    /// Serialize to the fixed 98-byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(AP_PARAMETERS_LEN);
        bytes.push(self.security.as_u8());
        bytes.push(self.ssid.len);
        bytes.extend_from_slice(&self.ssid.bytes);
        bytes.push(self.passphrase.len);
        bytes.extend_from_slice(&self.passphrase.bytes);
        bytes
    }

    /// Deserialize from a peer write.
    ///
    /// The write may stop early as long as it covers the declared SSID and
    /// passphrase lengths; missing trailing bytes read as zero.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParamsError> {
        if bytes.len() > AP_PARAMETERS_LEN {
            return Err(ParamsError::TooLong { len: bytes.len() });
        }
        let mut padded = [0u8; AP_PARAMETERS_LEN];
        padded[..bytes.len()].copy_from_slice(bytes);

        let security =
            Security::from_u8(padded[0]).ok_or(ParamsError::UnknownSecurity(padded[0]))?;

        let ssid_len = padded[1] as usize;
        if ssid_len > MAX_SSID_LEN {
            return Err(ParamsError::SsidTooLong { len: ssid_len });
        }
        let pass_len_at = 2 + MAX_SSID_LEN;
        if bytes.len() < 2 + ssid_len {
            return Err(ParamsError::Truncated);
        }

        let passphrase_len = padded[pass_len_at] as usize;
        if passphrase_len > MAX_PASSPHRASE_LEN {
            return Err(ParamsError::PassphraseTooLong {
                len: passphrase_len,
            });
        }
        if passphrase_len > 0 && bytes.len() < pass_len_at + 1 + passphrase_len {
            return Err(ParamsError::Truncated);
        }

        let pass_start = pass_len_at + 1;
        let params = Self::new(
            security,
            &padded[2..2 + ssid_len],
            &padded[pass_start..pass_start + passphrase_len],
        );
        padded.zeroize();
        params
    }
}

/// Reasons an ApParameters write is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    /// Payload larger than the 98-byte structure.
    TooLong { len: usize },
    /// Payload ends before the declared field lengths.
    Truncated,
    /// Security byte is not a known value.
    UnknownSecurity(u8),
    SsidEmpty,
    SsidTooLong { len: usize },
    PassphraseTooShort { len: usize, min: usize },
    PassphraseTooLong { len: usize },
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { len } => write!(
                f,
                "parameters too long: {} bytes (max {})",
                len, AP_PARAMETERS_LEN
            ),
            Self::Truncated => write!(f, "parameters truncated"),
            Self::UnknownSecurity(v) => write!(f, "unknown security type: {}", v),
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len } => {
                write!(f, "SSID too long: {} bytes (max {})", len, MAX_SSID_LEN)
            }
            Self::PassphraseTooShort { len, min } => {
                write!(f, "passphrase too short: {} bytes (min {})", len, min)
            }
            Self::PassphraseTooLong { len } => write!(
                f,
                "passphrase too long: {} bytes (max {})",
                len, MAX_PASSPHRASE_LEN
            ),
        }
    }
}

impl std::error::Error for ParamsError {}
