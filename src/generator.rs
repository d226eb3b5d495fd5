//! Rate-adaptive synthetic reading generator.
//!
//! [`SyntheticReadings`] is a lazy, infinite iterator of readings.
//! [`Generator::run`] opens one stream session and pushes one reading per
//! cycle, pausing for whatever [`FrequencyControl`] holds at that moment.
//! [`supervise`] restarts `run` after a fixed backoff whenever the session
//! cannot be opened; the generator itself keeps no retry state.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::StreamError;
use crate::frequency::FrequencyControl;
use crate::models::{WireReading, WriteAck};
use crate::stream::{GeneratorSession, StreamConnector};

/// Class identifiers drawn for `id1`.
pub const CLASS_IDS: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];

/// Inclusive upper bound of `id2`.
pub const MAX_ID2: i32 = 999;

/// Delay before the supervisor retries a session that failed to open.
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

// ---

/// Endless source of readings for one sensor type.
pub struct SyntheticReadings {
    rng: StdRng,
    sensor_type: String,
}

impl SyntheticReadings {
    pub fn new(sensor_type: impl Into<String>) -> Self {
        Self::with_rng(sensor_type, StdRng::from_entropy())
    }

    pub fn with_rng(sensor_type: impl Into<String>, rng: StdRng) -> Self {
        Self {
            rng,
            sensor_type: sensor_type.into(),
        }
    }
}

impl Iterator for SyntheticReadings {
    type Item = WireReading;

    fn next(&mut self) -> Option<WireReading> {
        // ---
        let id1 = CLASS_IDS[self.rng.gen_range(0..CLASS_IDS.len())];
        let id2 = self.rng.gen_range(0..=MAX_ID2);
        let value = self.rng.gen::<f64>() * 100.0;

        Some(WireReading::encode(
            value,
            &self.sensor_type,
            id1,
            id2,
            Utc::now(),
        ))
    }
}

// ---

pub struct Generator<C> {
    connector: C,
    frequency: FrequencyControl,
    readings: SyntheticReadings,
}

impl<C: StreamConnector> Generator<C> {
    // ---
    pub fn new(connector: C, frequency: FrequencyControl, readings: SyntheticReadings) -> Self {
        Self {
            connector,
            frequency,
            readings,
        }
    }

    /// Drive one stream session until `cancel` fires.
    ///
    /// Fails when the session cannot be opened, when the peer goes away
    /// mid-session, or when the graceful close after cancellation fails.
    /// Any other failed send is logged and the loop moves on to the next
    /// cycle.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<WriteAck, StreamError> {
        // ---
        let mut session = self.connector.open().await?;
        info!("Stream open, pace {} ms", self.frequency.get());

        let mut sent: u64 = 0;
        while !cancel.is_cancelled() {
            // Infinite iterator
            let Some(reading) = self.readings.next() else {
                break;
            };

            match session.send(&reading).await {
                Ok(()) => sent += 1,
                Err(e) if e.is_session_lost() => {
                    warn!("Stream lost after {} sends: {}", sent, e);
                    return Err(e);
                }
                Err(e) => warn!("Send error: {}", e),
            }

            // Read fresh every cycle so rate changes apply immediately
            let pause = self.frequency.interval();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Cancellation requested after {} sends, closing stream", sent);
        let ack = session.close().await?;
        info!("Ingestion acknowledged {} readings", ack.accepted_count);
        Ok(ack)
    }
}

/// Keep a generator running until `cancel` fires.
///
/// Every failed `run` (refused open or lost session) is logged and
/// retried after `backoff`.
pub async fn supervise<C: StreamConnector>(
    mut generator: Generator<C>,
    cancel: CancellationToken,
    backoff: Duration,
) {
    // ---
    loop {
        match generator.run(&cancel).await {
            Ok(_) => break,
            Err(e) => {
                error!("Generator stopped: {}; retrying in {:?}", e, backoff);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
    }
    info!("Generator supervisor exiting");
}
