//! Decoding of LYWSD03MMC notification payloads.
//!
//! The sensor pushes a 5-byte value on its data characteristic:
//!
//! | offset | width | meaning                                  |
//! |--------|-------|------------------------------------------|
//! | 0      | 2     | temperature, little-endian               |
//! | 2      | 1     | relative humidity in percent             |
//! | 3      | 2     | battery potential in millivolts, LE      |
//!
//! Every decoder here is a pure function of the payload.

use thiserror::Error;

/// Number of payload bytes the decoders read.
pub const PAYLOAD_LEN: usize = 5;

/// Battery potential considered empty, in millivolts.
pub const BATTERY_EMPTY_MV: f64 = 2100.0;

/// Battery potential considered full, in millivolts.
pub const BATTERY_FULL_MV: f64 = 3000.0;

/// Errors for payloads that cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Fewer bytes than the fixed layout needs
    #[error("payload too short: expected at least {PAYLOAD_LEN} bytes, got {0}")]
    TooShort(usize),
    /// Hex text with a dangling nibble
    #[error("payload hex has odd length {0}")]
    OddLength(usize),
    /// Hex text with characters outside 0-9a-fA-F
    #[error("payload is not valid hex: '{0}'")]
    InvalidHex(String),
}

/// A notification payload with the fixed sensor layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNotification([u8; PAYLOAD_LEN]);

impl RawNotification {
    /// Take the first [`PAYLOAD_LEN`] bytes of `data`. Trailing bytes are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let head = data
            .get(..PAYLOAD_LEN)
            .ok_or(DecodeError::TooShort(data.len()))?;
        let mut bytes = [0u8; PAYLOAD_LEN];
        bytes.copy_from_slice(head);
        Ok(Self(bytes))
    }

    /// Decode hex text such as `"46 08 44 c0 0a"`. Whitespace anywhere is ignored.
    pub fn from_hex(text: &str) -> Result<Self, DecodeError> {
        let digits: Vec<u8> = text
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();

        if digits.len() % 2 != 0 {
            return Err(DecodeError::OddLength(digits.len()));
        }

        let bytes = digits
            .chunks_exact(2)
            .map(|pair| match (hex_value(pair[0]), hex_value(pair[1])) {
                (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
                _ => Err(DecodeError::InvalidHex(text.trim().to_string())),
            })
            .collect::<Result<Vec<u8>, _>>()?;

        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_LEN] {
        &self.0
    }

    /// Raw temperature field, before the sign rule is applied.
    pub fn temperature_raw(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    pub fn humidity_raw(&self) -> u8 {
        self.0[2]
    }

    /// Battery potential in millivolts.
    pub fn battery_raw(&self) -> u16 {
        u16::from_le_bytes([self.0[3], self.0[4]])
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|v| v as u8)
}

/// Round the exact binary value to one decimal digit, ties away from zero.
///
/// `10.35_f64` lies just below 10.35, yet `10.35 * 10.0` rounds to exactly `103.5`.
/// The fused multiply-add yields the error of that product, which settles the
/// direction whenever the product lands on a half.
fn round1(value: f64) -> f64 {
    let scaled = value * 10.0;
    let residual = value.mul_add(10.0, -scaled);

    let rounded = if (scaled - scaled.trunc()).abs() == 0.5 && residual != 0.0 {
        if (residual > 0.0) == (scaled > 0.0) {
            scaled.round()
        } else {
            scaled.trunc()
        }
    } else {
        scaled.round()
    };
    rounded / 10.0
}

/// Relative humidity in percent, exactly as reported.
pub fn decode_humidity(raw: &RawNotification) -> u8 {
    raw.humidity_raw()
}

/// Temperature in Celsius, or Fahrenheit when `to_fahrenheit` is set.
///
/// A high byte of `0xFF` marks a negative reading in tenths of a degree, which is
/// returned unrounded. Non-negative readings are hundredths of a degree rounded to
/// one decimal. The Fahrenheit conversion is always rounded to one decimal.
pub fn decode_temperature(raw: &RawNotification, to_fahrenheit: bool) -> f64 {
    let value = raw.temperature_raw();
    let celsius = if raw.as_bytes()[1] == 0xFF {
        (f64::from(value) - 65536.0) / 10.0
    } else {
        round1(f64::from(value) / 100.0)
    };

    if to_fahrenheit {
        round1(celsius * 1.8 + 32.0)
    } else {
        celsius
    }
}

/// Battery level in percent, clamped to 0..=100.
pub fn decode_battery(raw: &RawNotification) -> u8 {
    let level = remap(
        f64::from(raw.battery_raw()),
        BATTERY_EMPTY_MV,
        BATTERY_FULL_MV,
        0.0,
        100.0,
    );
    level.round() as u8
}

/// Clamped linear rescale of `val` from `in_min..=in_max` onto `out_min..=out_max`,
/// rounded to one decimal.
///
/// `in_min` must differ from `in_max`.
pub fn remap(val: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    if val > in_max {
        out_max
    } else if val < in_min {
        out_min
    } else {
        round1((val - in_min) * (out_max - out_min) / (in_max - in_min) + out_min)
    }
}
