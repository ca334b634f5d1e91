//! Wall-clock abstraction.
//!
//! Clocks read "now" through a `TimeSource` so the local clock can run on
//! real system time in production and on controlled time in tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over reading the current time.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> f64;
}

/// Real time source using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    #[allow(clippy::cast_precision_loss)] // Epoch milliseconds fit in 53 bits until year 287396
    fn now_ms(&self) -> f64 {
        // A system clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |duration| duration.as_millis() as f64)
    }
}
