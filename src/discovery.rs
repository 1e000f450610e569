//! Discovery of nearby LYWSD03MMC sensors.

use crate::address::SensorAddress;
use crate::backend::{Bluetooth, ScanError};
use std::time::Duration;
use tracing::{info, warn};

/// Name the sensor advertises.
pub const SENSOR_MODEL: &str = "LYWSD03MMC";

/// Default length of a discovery scan.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(10);

/// Pick sensor addresses out of `hcitool lescan` output.
///
/// The scan prints `<address> <name>` per advertisement; every token equal to
/// [`SENSOR_MODEL`] yields the token right before it. Tokens that are not
/// addresses are skipped.
pub fn parse_scan_output(output: &str) -> Vec<SensorAddress> {
    let tokens: Vec<&str> = output.split_whitespace().collect();

    tokens
        .windows(2)
        .filter(|pair| pair[1] == SENSOR_MODEL)
        .filter_map(|pair| match pair[0].parse::<SensorAddress>() {
            Ok(address) => Some(address),
            Err(error) => {
                warn!(token = pair[0], %error, "skipping sensor with unreadable address");
                None
            }
        })
        .collect()
}

/// Run one bounded scan and return every sensor seen.
///
/// Finding nothing is not an error. Scan failures are returned as they are, there
/// is no retry.
pub async fn scan(
    bluetooth: &dyn Bluetooth,
    duration: Duration,
) -> Result<Vec<SensorAddress>, ScanError> {
    info!(seconds = duration.as_secs_f64(), "scanning for {SENSOR_MODEL} sensors");
    let sensors = bluetooth.scan(duration).await?;
    info!(count = sensors.len(), "scan finished");
    Ok(sensors)
}
