//! Simulated clock for deterministic testing.
//!
//! Time only moves when the test says so, and every move is delivered to
//! listeners synchronously, so a test observes the conductor's reaction to a
//! tick as soon as `set` or `advance` returns.

use std::sync::{Mutex, PoisonError};

use crate::time::{Clock, ClockListeners, ListenerHandle, TickCallback};

/// A clock driven by explicit calls.
///
/// # Example
///
/// ```
/// use conductor::simulation::SimulatedClock;
/// use conductor::time::Clock;
///
/// let clock = SimulatedClock::new("sim", 1000.0);
/// assert_eq!(clock.current_value(), 1000.0);
///
/// clock.advance(100.0);
/// assert_eq!(clock.current_value(), 1100.0);
/// ```
pub struct SimulatedClock {
    key: String,
    current: Mutex<f64>,
    listeners: ClockListeners,
}

impl SimulatedClock {
    #[must_use]
    pub fn new(key: &str, initial: f64) -> Self {
        Self {
            key: key.to_string(),
            current: Mutex::new(initial),
            listeners: ClockListeners::new(),
        }
    }

    /// Move to `value` and tick.
    ///
    /// May move time backwards.
    pub fn set(&self, value: f64) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = value;
        self.listeners.emit(value);
    }

    /// Move forward by `delta` and tick.
    pub fn advance(&self, delta: f64) {
        let value = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            *current += delta;
            *current
        };
        self.listeners.emit(value);
    }

    /// Tick again at the current value.
    pub fn tick(&self) {
        self.listeners.emit(self.current_value());
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Clock for SimulatedClock {
    fn key(&self) -> &str {
        &self.key
    }

    fn current_value(&self) -> f64 {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listen(&self, callback: TickCallback) -> ListenerHandle {
        self.listeners.add(callback)
    }
}

impl std::fmt::Debug for SimulatedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedClock")
            .field("key", &self.key)
            .field("current", &self.current_value())
            .finish_non_exhaustive()
    }
}
