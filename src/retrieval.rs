//! Retrieval of a single reading with bounded retries.
//!
//! LYWSD03MMC sensors only accept a connection now and then, so a reading is
//! fetched by starting a listen attempt on a fixed cadence until one of them
//! delivers a notification:
//!
//! ```text
//! offset   0s    20s    40s    60s ... floor(deadline / interval) * interval
//! attempt  #1    #2     #3     #4  ... #n
//! ```
//!
//! Attempts run concurrently and may complete in any order. The first one to
//! deliver a notification wins, later attempts are never started and ones still
//! in flight are dropped. Failures are logged and ignored, except for the last
//! scheduled attempt: when it fails, the retrieval fails with its error.

use crate::address::SensorAddress;
use crate::backend::{Bluetooth, ListenError};
use crate::decode::RawNotification;
use crate::reading::{Reading, TemperatureUnit};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Time between the starts of two consecutive attempts.
pub const DEFAULT_ATTEMPT_INTERVAL: Duration = Duration::from_secs(20);

/// Offset of the last attempt is the largest multiple of the interval within this.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(2 * 60);

/// Attempt schedule of one retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_ATTEMPT_INTERVAL,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl RetrievalConfig {
    /// Default interval with a deadline given in (possibly fractional) minutes.
    ///
    /// Negative or non-finite values give a zero deadline, i.e. a single attempt.
    pub fn from_minutes(timeout_minutes: f64) -> Self {
        Self {
            deadline: Duration::try_from_secs_f64(timeout_minutes * 60.0).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of scheduled attempts, both ends of the deadline included.
    ///
    /// Always at least one. A zero interval schedules exactly one attempt.
    pub fn attempt_count(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let slots = self.deadline.as_nanos() / self.interval.as_nanos();
        u32::try_from(slots).unwrap_or(u32::MAX - 1).min(u32::MAX - 1) + 1
    }

    /// Start offset of every attempt, relative to the start of the retrieval.
    pub fn attempt_offsets(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.attempt_count()).map(move |index| self.interval.saturating_mul(index))
    }
}

/// Error returned when a retrieval gives up.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Every scheduled attempt failed
    #[error("no data from {address} after {attempts} attempt(s): {last}")]
    NoData {
        address: SensorAddress,
        attempts: u32,
        #[source]
        last: ListenError,
    },
}

/// Fetch one reading from the sensor at `address`.
///
/// Resolves with the reading decoded from the first successful attempt, or with
/// [`RetrievalError::NoData`] carrying the error of the last scheduled attempt.
pub async fn get_data(
    bluetooth: &dyn Bluetooth,
    address: SensorAddress,
    unit: TemperatureUnit,
    config: &RetrievalConfig,
) -> Result<Reading, RetrievalError> {
    let attempts = config.attempt_count();
    let last = attempts - 1;
    let start = Instant::now();

    let mut in_flight: FuturesUnordered<BoxFuture<'_, (u32, Result<RawNotification, ListenError>)>> =
        FuturesUnordered::new();
    let mut next = 0u32;

    loop {
        let next_start = start + config.interval.saturating_mul(next);

        tokio::select! {
            biased;

            Some((index, result)) = in_flight.next(), if !in_flight.is_empty() => {
                let attempt = index + 1;
                match result {
                    Ok(raw) => {
                        let reading = Reading::from_notification(address, &raw, unit);
                        info!(%address, attempt, "reading received");
                        return Ok(reading);
                    }
                    Err(last_error) if index == last => {
                        return Err(RetrievalError::NoData {
                            address,
                            attempts,
                            last: last_error,
                        });
                    }
                    Err(error) => {
                        warn!(%address, attempt, %error, "listen attempt failed");
                    }
                }
            }

            _ = sleep_until(next_start), if next < attempts => {
                let index = next;
                next += 1;
                debug!(%address, attempt = index + 1, of = attempts, "starting listen attempt");
                in_flight.push(Box::pin(async move {
                    (index, bluetooth.listen_once(address).await)
                }));
            }

            else => unreachable!("the last scheduled attempt always resolves the retrieval"),
        }
    }
}
