//! Bluetooth hardware address of a sensor.
//!
//! Addresses come out of discovery as text tokens and go into retrieval as
//! arguments to the listen backends, so the type round-trips through the
//! colon-separated form used by BlueZ tooling.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A sensor address stored as six raw octets.
///
/// Displayed in upper-case `AA:BB:CC:DD:EE:FF` form; parsing accepts either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SensorAddress(pub [u8; 6]);

impl fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl Serialize for SensorAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Errors returned when parsing a sensor address.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseAddressError {
    #[error("invalid address '{0}': expected 6 colon-separated octets")]
    InvalidLength(String),
    #[error("invalid address '{address}': octet {index} is not two hex digits")]
    InvalidOctet { address: String, index: usize },
}

impl FromStr for SensorAddress {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(ParseAddressError::InvalidLength(s.to_string()));
        }

        let mut octets = [0u8; 6];
        for (index, part) in parts.iter().enumerate() {
            let valid = part.len() == 2 && part.bytes().all(|b| b.is_ascii_hexdigit());
            if !valid {
                return Err(ParseAddressError::InvalidOctet {
                    address: s.to_string(),
                    index,
                });
            }
            octets[index] = u8::from_str_radix(part, 16).map_err(|_| {
                ParseAddressError::InvalidOctet {
                    address: s.to_string(),
                    index,
                }
            })?;
        }

        Ok(SensorAddress(octets))
    }
}

impl From<[u8; 6]> for SensorAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for SensorAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}

#[cfg(feature = "bluer")]
impl From<SensorAddress> for bluer::Address {
    fn from(addr: SensorAddress) -> Self {
        bluer::Address(addr.0)
    }
}
