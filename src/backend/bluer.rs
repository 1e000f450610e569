//! BlueZ D-Bus backend for LYWSD03MMC sensors.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.

use super::{Bluetooth, ListenError, ScanError};
use crate::address::SensorAddress;
use crate::decode::RawNotification;
use crate::discovery::SENSOR_MODEL;
use bluer::{Adapter, AdapterEvent, Device, Session, Uuid};
use futures::future::BoxFuture;
use futures::{StreamExt, pin_mut};
use std::time::Duration;
use tracing::debug;

/// GATT characteristic carrying temperature, humidity and battery notifications.
pub const DATA_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xebe0ccc1_7a0a_4b0c_8a1a_6ff2997da3a6);

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

impl From<bluer::Error> for ListenError {
    fn from(err: bluer::Error) -> Self {
        ListenError::Bluetooth(err.to_string())
    }
}

/// Backend that talks to bluetoothd over D-Bus.
pub struct BluerBackend {
    // Keeps the D-Bus connection alive for `adapter`
    _session: Session,
    adapter: Adapter,
    listen_timeout: Duration,
}

impl BluerBackend {
    /// Connect to bluetoothd and power on the default adapter.
    pub async fn new(listen_timeout: Duration) -> Result<Self, ScanError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;

        Ok(Self {
            _session: session,
            adapter,
            listen_timeout,
        })
    }

    async fn run_scan(&self, duration: Duration) -> Result<Vec<SensorAddress>, ScanError> {
        // Changed devices are reported again, so names resolved late are still seen
        let events = self.adapter.discover_devices_with_changes().await?;
        pin_mut!(events);

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        let mut sightings = Sightings::default();
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(AdapterEvent::DeviceAdded(addr)) => {
                        let device = self.adapter.device(addr)?;
                        let name = device.name().await?;
                        debug!(address = %addr, ?name, "device seen");
                        sightings.observe(addr.into(), name.as_deref());
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        Ok(sightings.into_found())
    }

    async fn run_listen(&self, address: SensorAddress) -> Result<RawNotification, ListenError> {
        let device = self.adapter.device(address.into())?;

        bounded_session(self.listen_timeout, listen_session(&device), async {
            if let Err(error) = device.disconnect().await {
                debug!(%address, %error, "disconnect failed");
            }
        })
        .await
    }
}

/// Sensors picked out of discovery events, in the order they were first named.
#[derive(Debug, Default)]
struct Sightings {
    found: Vec<SensorAddress>,
}

impl Sightings {
    /// Record one sighting; returns true when it adds a new sensor.
    fn observe(&mut self, address: SensorAddress, name: Option<&str>) -> bool {
        if name != Some(SENSOR_MODEL) || self.found.contains(&address) {
            return false;
        }
        self.found.push(address);
        true
    }

    fn into_found(self) -> Vec<SensorAddress> {
        self.found
    }
}

/// Run `session` for at most `limit`, then `cleanup`, also when the limit hits.
async fn bounded_session<T>(
    limit: Duration,
    session: impl Future<Output = Result<T, ListenError>>,
    cleanup: impl Future<Output = ()>,
) -> Result<T, ListenError> {
    let result = match tokio::time::timeout(limit, session).await {
        Ok(result) => result,
        Err(_) => Err(ListenError::TimedOut(limit)),
    };
    cleanup.await;
    result
}

async fn listen_session(device: &Device) -> Result<RawNotification, ListenError> {
    if !device.is_connected().await? {
        device.connect().await?;
    }
    first_notification(device).await
}

async fn first_notification(device: &Device) -> Result<RawNotification, ListenError> {
    for service in device.services().await? {
        for characteristic in service.characteristics().await? {
            if characteristic.uuid().await? != DATA_CHARACTERISTIC_UUID {
                continue;
            }

            let notifications = characteristic.notify().await?;
            pin_mut!(notifications);
            return match notifications.next().await {
                Some(value) => Ok(RawNotification::from_bytes(&value)?),
                None => Err(ListenError::NoNotification),
            };
        }
    }

    Err(ListenError::Bluetooth(format!(
        "characteristic {DATA_CHARACTERISTIC_UUID} not found"
    )))
}

impl Bluetooth for BluerBackend {
    fn scan(&self, duration: Duration) -> BoxFuture<'_, Result<Vec<SensorAddress>, ScanError>> {
        Box::pin(self.run_scan(duration))
    }

    fn listen_once(
        &self,
        address: SensorAddress,
    ) -> BoxFuture<'_, Result<RawNotification, ListenError>> {
        Box::pin(self.run_listen(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_address_conversion_round_trip() {
        let addr = bluer::Address([0xA4, 0xC1, 0x38, 0x0B, 0x2E, 0x01]);
        let sensor: SensorAddress = addr.into();
        assert_eq!(sensor.to_string(), "A4:C1:38:0B:2E:01");
        assert_eq!(bluer::Address::from(sensor), addr);
    }

    #[test]
    fn test_sightings_match_late_names_once() {
        let addr = SensorAddress([0xA4, 0xC1, 0x38, 0x0B, 0x2E, 0x01]);
        let other = SensorAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let mut sightings = Sightings::default();

        assert!(!sightings.observe(addr, None));
        assert!(!sightings.observe(other, Some("[TV] Living Room")));
        assert!(sightings.observe(addr, Some(SENSOR_MODEL)));
        assert!(!sightings.observe(addr, Some(SENSOR_MODEL)));

        assert_eq!(sightings.into_found(), vec![addr]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_session_cleans_up_after_timeout() {
        let cleaned = AtomicBool::new(false);
        let result: Result<(), ListenError> = bounded_session(
            Duration::from_secs(15),
            std::future::pending(),
            async { cleaned.store(true, Ordering::SeqCst) },
        )
        .await;

        assert!(matches!(result, Err(ListenError::TimedOut(limit)) if limit == Duration::from_secs(15)));
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_session_cleans_up_after_result() {
        let cleaned = AtomicBool::new(false);
        let result = bounded_session(
            Duration::from_secs(15),
            async { Err::<(), _>(ListenError::NoNotification) },
            async { cleaned.store(true, Ordering::SeqCst) },
        )
        .await;

        assert!(matches!(result, Err(ListenError::NoNotification)));
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[test]
    fn test_data_characteristic_uuid() {
        assert_eq!(
            DATA_CHARACTERISTIC_UUID.to_string(),
            "ebe0ccc1-7a0a-4b0c-8a1a-6ff2997da3a6"
        );
    }
}
