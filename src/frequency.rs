//! Process-wide emission pace.
//!
//! A single atomically-updated scalar. The configuration boundary writes it,
//! the generator reads it once per cycle. No lower bound is enforced here;
//! callers validate against [`MIN_FREQUENCY_MS`] before calling [`FrequencyControl::set`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pace used when nothing else is configured.
pub const DEFAULT_FREQUENCY_MS: u64 = 1000;

/// Smallest pace the configuration boundary accepts.
pub const MIN_FREQUENCY_MS: u64 = 100;

// ---

/// Cloneable handle to the shared interval, in milliseconds.
#[derive(Debug, Clone)]
pub struct FrequencyControl {
    interval_ms: Arc<AtomicU64>,
}

impl Default for FrequencyControl {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY_MS)
    }
}

impl FrequencyControl {
    // ---
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: Arc::new(AtomicU64::new(interval_ms)),
        }
    }

    /// Store a new pace; visible to a running generator on its next cycle.
    pub fn set(&self, interval_ms: u64) {
        self.interval_ms.store(interval_ms, Ordering::Release);
    }

    /// Latest stored pace. Never blocks.
    pub fn get(&self) -> u64 {
        self.interval_ms.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.get())
    }
}
