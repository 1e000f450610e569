//! `mijia-listener` library.
//!
//! Reads Xiaomi Mijia LYWSD03MMC thermometers: [`discovery`] finds them,
//! [`retrieval`] keeps retrying a single [`backend::Bluetooth::listen_once`]
//! attempt until one yields a notification, and [`decode`] turns its payload into
//! a [`Reading`].
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup and
//! process exit codes. The core “business logic” lives in [`crate::app`] where it
//! can be tested deterministically with an injected backend + output streams.

pub mod address;
pub mod alias;
pub mod app;
pub mod backend;
pub mod decode;
pub mod discovery;
pub mod output;
pub mod reading;
pub mod retrieval;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use address::{ParseAddressError, SensorAddress};
pub use alias::{Alias, AliasMap, parse_alias, to_map};
pub use backend::{Backend, Bluetooth, ListenError, ScanError};
pub use decode::{
    DecodeError, RawNotification, decode_battery, decode_humidity, decode_temperature, remap,
};
pub use discovery::scan;
pub use output::{InfluxDbFormatter, JsonFormatter, OutputFormat, OutputFormatter, TextFormatter};
pub use reading::{Reading, TemperatureUnit};
pub use retrieval::{RetrievalConfig, RetrievalError, get_data};
