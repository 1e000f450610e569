//! Bluetooth backends for LYWSD03MMC sensors.
//!
//! A backend knows how to run one bounded scan and one listen attempt. Retry
//! scheduling and decoding stay outside of the backends, in
//! [`crate::retrieval`] and [`crate::decode`].

#[cfg(feature = "bluer")]
pub mod bluer;

pub mod tools;

use crate::address::SensorAddress;
use crate::decode::{DecodeError, RawNotification};
use futures::future::BoxFuture;
use std::io;
use std::time::Duration;
use thiserror::Error;

pub use tools::{ToolsBackend, ToolsConfig};

/// Error type for scan operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The scan utility could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The scan wrote to its diagnostic stream
    #[error("scan failed: {0}")]
    Diagnostics(String),
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Error type for a single listen attempt.
#[derive(Error, Debug)]
pub enum ListenError {
    /// The listen utility could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The listen utility exited unsuccessfully without a notification
    #[error("listen failed: {0}")]
    Failed(String),
    /// The listen utility wrote to its diagnostic stream
    #[error("{0}")]
    Diagnostics(String),
    /// The session ended without a notification
    #[error("no notification received")]
    NoNotification,
    #[error("no notification within {0:?}")]
    TimedOut(Duration),
    /// A notification arrived but its payload does not fit the sensor layout
    #[error("malformed notification: {0}")]
    Malformed(#[from] DecodeError),
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// A way of talking to nearby sensors.
///
/// Implemented by the compiled-in backends and by scripted fakes in tests.
pub trait Bluetooth: Send + Sync {
    /// Scan for `duration` and return the addresses of every LYWSD03MMC seen.
    fn scan(&self, duration: Duration) -> BoxFuture<'_, Result<Vec<SensorAddress>, ScanError>>;

    /// Connect to `address` and wait for a single data notification.
    fn listen_once(
        &self,
        address: SensorAddress,
    ) -> BoxFuture<'_, Result<RawNotification, ListenError>>;
}

/// Available Bluetooth backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ command-line utilities (hcitool, gatttool)
    #[default]
    Tools,
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Tools => write!(f, "tools"),
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tools" | "gatttool" => Ok(Backend::Tools),
            #[cfg(feature = "bluer")]
            "bluer" | "bluez" => Ok(Backend::Bluer),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Open the selected backend.
///
/// The tools backend only needs `tools`; the D-Bus backend uses its listen timeout
/// and connects to bluetoothd up front.
pub async fn open(backend: Backend, tools: ToolsConfig) -> Result<Box<dyn Bluetooth>, ScanError> {
    match backend {
        Backend::Tools => Ok(Box::new(ToolsBackend::new(tools))),
        #[cfg(feature = "bluer")]
        Backend::Bluer => Ok(Box::new(
            self::bluer::BluerBackend::new(tools.listen_timeout).await?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(Backend::from_str("tools").unwrap(), Backend::Tools);
        assert_eq!(Backend::from_str("GATTTOOL").unwrap(), Backend::Tools);
        assert!(Backend::from_str("invalid").is_err());
    }

    #[cfg(feature = "bluer")]
    #[test]
    fn test_bluer_backend_from_str() {
        assert_eq!(Backend::from_str("bluer").unwrap(), Backend::Bluer);
        assert_eq!(Backend::from_str("bluez").unwrap(), Backend::Bluer);
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::Tools.to_string(), "tools");
        assert_eq!(Backend::default(), Backend::Tools);
    }

    #[test]
    fn test_listen_error_display() {
        let err = ListenError::Malformed(DecodeError::TooShort(3));
        assert_eq!(
            err.to_string(),
            "malformed notification: payload too short: expected at least 5 bytes, got 3"
        );
        assert_eq!(
            ListenError::Diagnostics("connect error: Connection refused (111)".into()).to_string(),
            "connect error: Connection refused (111)"
        );
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::Diagnostics("Set scan parameters failed: Input/output error".into());
        assert_eq!(
            err.to_string(),
            "scan failed: Set scan parameters failed: Input/output error"
        );
    }

    #[tokio::test]
    async fn test_open_tools_backend() {
        let backend = open(Backend::Tools, ToolsConfig::default()).await;
        assert!(backend.is_ok());
    }
}
