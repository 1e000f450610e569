//! Sensor reading data structure.

use crate::address::SensorAddress;
use crate::decode::{RawNotification, decode_battery, decode_humidity, decode_temperature};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::SystemTime;

/// Unit of [`Reading::temperature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_fahrenheit_flag(use_fahrenheit: bool) -> Self {
        if use_fahrenheit {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    pub fn is_fahrenheit(self) -> bool {
        self == TemperatureUnit::Fahrenheit
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => write!(f, "celsius"),
            TemperatureUnit::Fahrenheit => write!(f, "fahrenheit"),
        }
    }
}

/// A complete reading from one LYWSD03MMC sensor.
///
/// All three values always come from the same notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Address of the sensor the notification came from
    pub address: SensorAddress,
    /// Relative humidity in percent
    pub humidity_level: u8,
    /// Temperature in `unit`, at most one fractional digit in practice
    pub temperature: f64,
    /// Battery level in percent (0-100)
    pub battery_level: u8,
    pub unit: TemperatureUnit,
    /// When the notification was decoded
    #[serde(serialize_with = "serialize_unix_millis")]
    pub timestamp: SystemTime,
}

impl Reading {
    /// Decode a notification into a reading stamped with the current time.
    pub fn from_notification(
        address: SensorAddress,
        raw: &RawNotification,
        unit: TemperatureUnit,
    ) -> Self {
        Reading {
            address,
            humidity_level: decode_humidity(raw),
            temperature: decode_temperature(raw, unit.is_fahrenheit()),
            battery_level: decode_battery(raw),
            unit,
            timestamp: SystemTime::now(),
        }
    }
}

fn serialize_unix_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    serializer.serialize_u64(millis)
}
