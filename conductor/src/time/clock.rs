//! Clocks (tick sources).
//!
//! A clock is an externally owned generator of "now" values. The conductor
//! only listens: it registers a callback with [`Clock::listen`] and keeps the
//! returned [`ListenerHandle`]. Dropping the handle unsubscribes.
//!
//! # Invariants
//!
//! - Listeners are invoked outside the listener table lock, so a callback may
//!   subscribe, unsubscribe, or call back into its owner without deadlocking
//! - A dropped handle is never invoked by an `emit` that starts after the drop

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use crate::time::source::{SystemTimeSource, TimeSource};

/// Key of the built-in wall clock.
pub const LOCAL_CLOCK: &str = "local";

/// Callback invoked with each tick value.
pub type TickCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// A source of ticks.
pub trait Clock: Send + Sync {
    /// Registry key, also used as the URL mode value.
    fn key(&self) -> &str;

    /// Human readable name.
    fn name(&self) -> &str {
        self.key()
    }

    /// The clock's current value without waiting for a tick.
    fn current_value(&self) -> f64;

    /// Register a tick callback. The subscription lasts as long as the
    /// returned handle.
    ///
    /// Implementations may invoke `callback` before returning, for example to
    /// report the current value on subscribe.
    fn listen(&self, callback: TickCallback) -> ListenerHandle;
}

struct ListenerTable {
    next_id: u64,
    callbacks: BTreeMap<u64, TickCallback>,
}

/// Listener bookkeeping shared by clock implementations.
pub struct ClockListeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl ClockListeners {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(ListenerTable {
                next_id: 0,
                callbacks: BTreeMap::new(),
            })),
        }
    }

    /// Register a callback.
    #[must_use]
    pub fn add(&self, callback: TickCallback) -> ListenerHandle {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let id = table.next_id;
        table.next_id += 1;
        table.callbacks.insert(id, callback);
        ListenerHandle {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Invoke every registered callback with `value`, in registration order.
    #[allow(clippy::disallowed_methods)] // Arc::clone of callbacks
    pub fn emit(&self, value: f64) {
        let callbacks: Vec<TickCallback> = {
            let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.callbacks.values().map(Arc::clone).collect()
        };
        for callback in callbacks {
            callback(value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClockListeners {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription to a clock. Unsubscribes on drop.
pub struct ListenerHandle {
    id: u64,
    table: Weak<Mutex<ListenerTable>>,
}

impl ListenerHandle {
    /// Explicitly unsubscribe.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        // The clock may already be gone, in which case there is nothing to remove.
        if let Some(table) = self.table.upgrade() {
            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .callbacks
                .remove(&self.id);
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

/// Wall clock that ticks at a fixed interval.
pub struct LocalClock<T: TimeSource = SystemTimeSource> {
    time_source: T,
    interval: Duration,
    listeners: ClockListeners,
}

impl LocalClock<SystemTimeSource> {
    /// Create a wall clock on system time.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::with_time_source(SystemTimeSource, interval)
    }
}

impl<T: TimeSource> LocalClock<T> {
    #[must_use]
    pub fn with_time_source(time_source: T, interval: Duration) -> Self {
        Self {
            time_source,
            interval,
            listeners: ClockListeners::new(),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Read the time source and notify listeners.
    pub fn tick(&self) -> f64 {
        let now = self.time_source.now_ms();
        self.listeners.emit(now);
        now
    }
}

impl<T: TimeSource + 'static> LocalClock<T> {
    /// Spawn the tick loop.
    ///
    /// The task holds a weak reference and exits once the clock is dropped.
    pub fn start(clock: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(clock);
        let interval = clock.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(clock) = weak.upgrade() else {
                    tracing::debug!("local clock dropped, stopping tick loop");
                    break;
                };
                clock.tick();
            }
        })
    }
}

impl<T: TimeSource> Clock for LocalClock<T> {
    fn key(&self) -> &str {
        LOCAL_CLOCK
    }

    fn name(&self) -> &str {
        "Local Clock"
    }

    fn current_value(&self) -> f64 {
        self.time_source.now_ms()
    }

    fn listen(&self, callback: TickCallback) -> ListenerHandle {
        self.listeners.add(callback)
    }
}
