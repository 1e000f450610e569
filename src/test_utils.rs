use crate::address::SensorAddress;
use crate::backend::{Bluetooth, ListenError, ScanError};
use crate::decode::RawNotification;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A stable address for unit tests.
pub const TEST_ADDRESS: SensorAddress = SensorAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// 21.2°C, 68% humidity, 2752 mV battery.
pub fn sample_notification() -> RawNotification {
    RawNotification::from_bytes(&[0x46, 0x08, 0x44, 0xC0, 0x0A]).unwrap()
}

struct Step {
    delay: Duration,
    outcome: Result<RawNotification, ListenError>,
}

/// Scripted backend: scans return a fixed result and every listen attempt pops
/// the next scripted outcome for its address.
///
/// Listen attempts past the end of a script fail with `NoNotification`. Start
/// offsets are recorded against the (usually paused) tokio clock.
pub struct FakeBluetooth {
    epoch: Instant,
    scan: Mutex<Option<Result<Vec<SensorAddress>, String>>>,
    scan_durations: Mutex<Vec<Duration>>,
    scripts: Mutex<HashMap<SensorAddress, VecDeque<Step>>>,
    listens: Mutex<Vec<(SensorAddress, Duration)>>,
}

impl FakeBluetooth {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            scan: Mutex::new(None),
            scan_durations: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            listens: Mutex::new(Vec::new()),
        }
    }

    /// Result of every scan; an error string becomes `ScanError::Diagnostics`.
    pub fn with_scan(self, result: Result<Vec<SensorAddress>, String>) -> Self {
        *self.scan.lock().unwrap() = Some(result);
        self
    }

    /// Append immediate outcomes; error strings become `ListenError::Diagnostics`.
    pub fn with_listen(
        self,
        address: SensorAddress,
        outcomes: impl IntoIterator<Item = Result<RawNotification, String>>,
    ) -> Self {
        outcomes.into_iter().fold(self, |fake, outcome| {
            fake.with_delayed_listen(address, Duration::ZERO, outcome)
        })
    }

    /// Append one outcome delivered `delay` after the attempt starts.
    pub fn with_delayed_listen(
        self,
        address: SensorAddress,
        delay: Duration,
        outcome: Result<RawNotification, String>,
    ) -> Self {
        self.push_step(
            address,
            Step {
                delay,
                outcome: outcome.map_err(ListenError::Diagnostics),
            },
        )
    }

    pub fn with_listen_error(self, address: SensorAddress, error: ListenError) -> Self {
        self.push_step(
            address,
            Step {
                delay: Duration::ZERO,
                outcome: Err(error),
            },
        )
    }

    fn push_step(self, address: SensorAddress, step: Step) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(address)
            .or_default()
            .push_back(step);
        self
    }

    pub fn scan_durations(&self) -> Vec<Duration> {
        self.scan_durations.lock().unwrap().clone()
    }

    /// Start offsets of every listen attempt, any address.
    pub fn listen_offsets(&self) -> Vec<Duration> {
        self.listens.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    /// Addresses of every listen attempt, in start order.
    pub fn listened_addresses(&self) -> Vec<SensorAddress> {
        self.listens.lock().unwrap().iter().map(|(a, _)| *a).collect()
    }
}

impl Bluetooth for FakeBluetooth {
    fn scan(&self, duration: Duration) -> BoxFuture<'_, Result<Vec<SensorAddress>, ScanError>> {
        self.scan_durations.lock().unwrap().push(duration);
        let result = match self.scan.lock().unwrap().clone() {
            Some(Ok(found)) => Ok(found),
            Some(Err(message)) => Err(ScanError::Diagnostics(message)),
            None => Ok(Vec::new()),
        };
        Box::pin(async move { result })
    }

    fn listen_once(
        &self,
        address: SensorAddress,
    ) -> BoxFuture<'_, Result<RawNotification, ListenError>> {
        self.listens
            .lock()
            .unwrap()
            .push((address, self.epoch.elapsed()));
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&address)
            .and_then(VecDeque::pop_front);

        Box::pin(async move {
            match step {
                Some(Step { delay, outcome }) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    outcome
                }
                None => Err(ListenError::NoNotification),
            }
        })
    }
}
