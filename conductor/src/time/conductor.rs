//! The time conductor.
//!
//! Holds the application-wide time state: the active time system, the
//! visible bounds, the followed clock and its offsets, and the time of
//! interest. The conductor is in **fixed** mode while no clock is attached
//! and in **follow** mode while one is.
//!
//! # Mode transitions
//!
//! - Fixed → Fixed: only bounds and time system change
//! - Fixed → Follow: subscribe to the clock, resolve offsets, derive bounds
//!   from the clock's current value
//! - Follow → Follow: the new clock is subscribed first, then the old
//!   subscription is dropped; ticks from the old clock are ignored by
//!   generation
//! - Follow → Fixed: unsubscribe; the last computed bounds become the fixed
//!   bounds
//!
//! # Invariants
//!
//! - Stored bounds always pass [`validate_bounds`]
//! - Stored offsets always pass [`validate_offsets`]
//! - Only ticks from the currently attached clock change bounds
//! - A rejected setter leaves all state untouched and emits nothing
//! - `TimeSystem` events are always followed by a `Bounds` event

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::time::bounds::{
    BoundsViolation, ClockOffsets, TimeBounds, rebase_bounds, validate_bounds, validate_offsets,
};
use crate::time::clock::{Clock, ListenerHandle};
use crate::time::event::{ConductorEvent, EVENT_CHANNEL_CAPACITY, EventReceiver};
use crate::time::system::TimeSystem;

/// Fixed or follow mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Mode {
    /// No clock attached; bounds change only when set.
    Fixed,
    /// Bounds track the named clock.
    Follow { clock: String },
}

/// Serializable copy of the conductor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConductorSnapshot {
    pub time_system: String,
    pub mode: Mode,
    pub bounds: TimeBounds,
    pub clock_offsets: Option<ClockOffsets>,
    pub time_of_interest: Option<f64>,
}

struct ActiveClock {
    clock: Arc<dyn Clock>,
    generation: u64,
    // Held for its Drop, which unsubscribes from the clock.
    _listener: ListenerHandle,
}

struct ConductorState {
    time_systems: BTreeMap<String, TimeSystem>,
    clocks: BTreeMap<String, Arc<dyn Clock>>,
    time_system: TimeSystem,
    bounds: TimeBounds,
    offsets: Option<ClockOffsets>,
    active_clock: Option<ActiveClock>,
    next_generation: u64,
    time_of_interest: Option<f64>,
}

struct Shared {
    state: Mutex<ConductorState>,
    events: broadcast::Sender<ConductorEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ConductorState> {
        // Every mutation validates before writing, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ConductorEvent) {
        // Sending with no receivers is not an error for the conductor.
        let _ = self.events.send(event);
    }

    fn on_tick(&self, generation: u64, now: f64) {
        let mut state = self.lock();
        let Some(active) = &state.active_clock else {
            tracing::debug!("ignoring tick while in fixed mode");
            return;
        };
        if active.generation != generation {
            tracing::debug!(generation, "ignoring tick from detached clock");
            return;
        }
        let Some(offsets) = state.offsets else {
            return;
        };
        let bounds = TimeBounds::around(now, offsets);
        if let Err(violation) = validate_bounds(&bounds) {
            tracing::warn!(now, %violation, "clock produced invalid bounds, tick ignored");
            return;
        }
        state.bounds = bounds;
        self.emit(ConductorEvent::Bounds { bounds, tick: true });
    }
}

/// Handle to the time conductor.
///
/// Cloning the handle shares the same state. All methods take `&self`.
#[derive(Clone)]
pub struct TimeConductor {
    shared: Arc<Shared>,
}

impl TimeConductor {
    /// Create a conductor in fixed mode with an initial time system and bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConductorError::InvalidBounds` if `bounds` fails validation.
    pub fn new(time_system: TimeSystem, bounds: TimeBounds) -> Result<Self, ConductorError> {
        validate_bounds(&bounds).map_err(ConductorError::InvalidBounds)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut time_systems = BTreeMap::new();
        time_systems.insert(time_system.key.clone(), time_system.clone());
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ConductorState {
                    time_systems,
                    clocks: BTreeMap::new(),
                    time_system,
                    bounds,
                    offsets: None,
                    active_clock: None,
                    next_generation: 0,
                    time_of_interest: None,
                }),
                events,
            }),
        })
    }

    /// Subscribe to change events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    // ----- registries -----

    /// Register a time system, replacing any with the same key.
    pub fn add_time_system(&self, time_system: TimeSystem) {
        let mut state = self.shared.lock();
        state
            .time_systems
            .insert(time_system.key.clone(), time_system);
    }

    /// All registered time systems, ordered by key.
    #[must_use]
    pub fn time_systems(&self) -> Vec<TimeSystem> {
        self.shared.lock().time_systems.values().cloned().collect()
    }

    /// Register a clock, replacing any with the same key.
    ///
    /// Replacing the registry entry does not detach a clock that is
    /// currently followed.
    pub fn add_clock(&self, clock: Arc<dyn Clock>) {
        let mut state = self.shared.lock();
        state.clocks.insert(clock.key().to_string(), clock);
    }

    /// All registered clocks, ordered by key.
    #[must_use]
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub fn clocks(&self) -> Vec<Arc<dyn Clock>> {
        self.shared.lock().clocks.values().map(Arc::clone).collect()
    }

    /// Look up a registered clock.
    #[must_use]
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub fn clock_by_key(&self, key: &str) -> Option<Arc<dyn Clock>> {
        self.shared.lock().clocks.get(key).map(Arc::clone)
    }

    // ----- bounds -----

    #[must_use]
    pub fn bounds(&self) -> TimeBounds {
        self.shared.lock().bounds
    }

    /// Replace the bounds.
    ///
    /// While following a clock the next tick overrides these bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConductorError::InvalidBounds` and changes nothing if the
    /// bounds are not finite or `start > end`.
    pub fn set_bounds(&self, bounds: TimeBounds) -> Result<(), ConductorError> {
        validate_bounds(&bounds).map_err(ConductorError::InvalidBounds)?;
        let mut state = self.shared.lock();
        state.bounds = bounds;
        self.shared.emit(ConductorEvent::Bounds {
            bounds,
            tick: false,
        });
        Ok(())
    }

    // ----- time system -----

    #[must_use]
    pub fn time_system(&self) -> TimeSystem {
        self.shared.lock().time_system.clone()
    }

    /// Select a registered time system.
    ///
    /// Without explicit bounds, follow mode derives them from the clock's
    /// current value and offsets, and fixed mode uses the time system's
    /// default bounds.
    ///
    /// # Errors
    ///
    /// - `UnknownTimeSystem` if `key` is not registered
    /// - `InvalidBounds` if the supplied or derived bounds are invalid
    /// - `MissingBounds` if no bounds were supplied and none can be derived
    pub fn set_time_system(
        &self,
        key: &str,
        bounds: Option<TimeBounds>,
    ) -> Result<(), ConductorError> {
        let mut state = self.shared.lock();
        let time_system = state
            .time_systems
            .get(key)
            .cloned()
            .ok_or_else(|| ConductorError::UnknownTimeSystem(key.to_string()))?;

        let bounds = match bounds {
            Some(bounds) => bounds,
            None => match (&state.active_clock, state.offsets) {
                (Some(active), Some(offsets)) => {
                    TimeBounds::around(active.clock.current_value(), offsets)
                }
                _ => time_system
                    .defaults
                    .bounds
                    .ok_or_else(|| ConductorError::MissingBounds(key.to_string()))?,
            },
        };
        validate_bounds(&bounds).map_err(ConductorError::InvalidBounds)?;

        tracing::debug!(time_system = key, "time system changed");
        state.time_system = time_system;
        state.bounds = bounds;
        self.shared.emit(ConductorEvent::TimeSystem {
            key: key.to_string(),
        });
        self.shared.emit(ConductorEvent::Bounds {
            bounds,
            tick: false,
        });
        Ok(())
    }

    // ----- mode and clock -----

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.shared
            .lock()
            .active_clock
            .as_ref()
            .map_or(Mode::Fixed, |active| Mode::Follow {
                clock: active.clock.key().to_string(),
            })
    }

    #[must_use]
    pub fn is_following(&self) -> bool {
        self.shared.lock().active_clock.is_some()
    }

    /// The followed clock, if any.
    #[must_use]
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub fn clock(&self) -> Option<Arc<dyn Clock>> {
        self.shared
            .lock()
            .active_clock
            .as_ref()
            .map(|active| Arc::clone(&active.clock))
    }

    /// Switch mode explicitly.
    ///
    /// `offsets` only applies when entering follow mode.
    ///
    /// # Errors
    ///
    /// See [`Self::set_clock_by_key`].
    pub fn set_mode(
        &self,
        mode: Mode,
        offsets: Option<ClockOffsets>,
    ) -> Result<(), ConductorError> {
        match mode {
            Mode::Fixed => {
                self.stop_clock();
                Ok(())
            }
            Mode::Follow { clock } => self.set_clock_by_key(&clock, offsets),
        }
    }

    /// Follow a registered clock.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClock` if `key` is not registered, otherwise see
    /// [`Self::set_clock`].
    pub fn set_clock_by_key(
        &self,
        key: &str,
        offsets: Option<ClockOffsets>,
    ) -> Result<(), ConductorError> {
        let clock = self
            .clock_by_key(key)
            .ok_or_else(|| ConductorError::UnknownClock(key.to_string()))?;
        self.set_clock(clock, offsets)
    }

    /// Follow `clock`, registering it if needed.
    ///
    /// Offsets resolve to, in order: `offsets`, the stored offsets, the
    /// active time system's default offsets.
    ///
    /// The clock is read and subscribed without holding the state lock, so a
    /// clock may invoke the callback from inside `listen`. Such a tick is
    /// ignored because its generation is not active yet. If another
    /// `set_clock` starts while this one is subscribing, the later call wins
    /// and this one returns without changing state.
    ///
    /// # Errors
    ///
    /// - `InvalidOffsets` if the supplied offsets are invalid
    /// - `MissingOffsets` if no offsets can be resolved
    /// - `InvalidBounds` if the clock's current value yields invalid bounds
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub fn set_clock(
        &self,
        clock: Arc<dyn Clock>,
        offsets: Option<ClockOffsets>,
    ) -> Result<(), ConductorError> {
        if let Some(offsets) = &offsets {
            validate_offsets(offsets).map_err(ConductorError::InvalidOffsets)?;
        }
        let key = clock.key().to_string();
        let now = clock.current_value();

        let (offsets, bounds, generation) = {
            let mut state = self.shared.lock();
            let offsets = offsets
                .or(state.offsets)
                .or(state.time_system.defaults.offsets)
                .ok_or_else(|| ConductorError::MissingOffsets(key.clone()))?;
            let bounds = TimeBounds::around(now, offsets);
            validate_bounds(&bounds).map_err(ConductorError::InvalidBounds)?;

            let same_clock = state
                .active_clock
                .as_ref()
                .is_some_and(|active| Arc::ptr_eq(&active.clock, &clock));
            if same_clock {
                state.offsets = Some(offsets);
                state.bounds = bounds;
                self.shared.emit(ConductorEvent::ClockOffsets { offsets });
                self.shared.emit(ConductorEvent::Bounds {
                    bounds,
                    tick: false,
                });
                return Ok(());
            }

            let generation = state.next_generation;
            state.next_generation += 1;
            (offsets, bounds, generation)
        };

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let listener = clock.listen(Arc::new(move |now| {
            if let Some(shared) = weak.upgrade() {
                shared.on_tick(generation, now);
            }
        }));

        let mut state = self.shared.lock();
        if state.next_generation != generation + 1 {
            tracing::debug!(clock = %key, "clock attach superseded by a later attach");
            return Ok(());
        }
        state.clocks.entry(key.clone()).or_insert_with(|| Arc::clone(&clock));
        // Replacing the previous clock drops its handle, which unsubscribes it.
        state.active_clock = Some(ActiveClock {
            clock,
            generation,
            _listener: listener,
        });
        state.offsets = Some(offsets);
        state.bounds = bounds;
        tracing::debug!(clock = %key, "following clock");

        self.shared.emit(ConductorEvent::Clock { key: Some(key) });
        self.shared.emit(ConductorEvent::ClockOffsets { offsets });
        self.shared.emit(ConductorEvent::Bounds {
            bounds,
            tick: false,
        });
        Ok(())
    }

    /// Detach the followed clock, freezing the current bounds.
    ///
    /// Does nothing in fixed mode.
    pub fn stop_clock(&self) {
        let mut state = self.shared.lock();
        let Some(active) = state.active_clock.take() else {
            return;
        };
        tracing::debug!(clock = active.clock.key(), "stopped following clock");
        drop(active);
        self.shared.emit(ConductorEvent::Clock { key: None });
    }

    // ----- offsets -----

    #[must_use]
    pub fn clock_offsets(&self) -> Option<ClockOffsets> {
        self.shared.lock().offsets
    }

    /// Replace the follow-mode offsets.
    ///
    /// In follow mode the bounds are rebased on the previous true "now"
    /// (`bounds.end - previous.end`) so repeated changes never drift. In
    /// fixed mode the offsets are stored for the next clock attach.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOffsets` and changes nothing if an offset is negative
    /// or not finite.
    pub fn set_clock_offsets(&self, offsets: ClockOffsets) -> Result<(), ConductorError> {
        validate_offsets(&offsets).map_err(ConductorError::InvalidOffsets)?;
        let mut state = self.shared.lock();

        let rebased = match (&state.active_clock, state.offsets) {
            (Some(_), Some(previous)) => {
                let bounds = rebase_bounds(state.bounds, previous, offsets);
                validate_bounds(&bounds).map_err(ConductorError::InvalidBounds)?;
                Some(bounds)
            }
            _ => None,
        };

        state.offsets = Some(offsets);
        self.shared.emit(ConductorEvent::ClockOffsets { offsets });
        if let Some(bounds) = rebased {
            state.bounds = bounds;
            self.shared.emit(ConductorEvent::Bounds {
                bounds,
                tick: false,
            });
        }
        Ok(())
    }

    // ----- time of interest -----

    #[must_use]
    pub fn time_of_interest(&self) -> Option<f64> {
        self.shared.lock().time_of_interest
    }

    /// Set or clear the time of interest.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimeOfInterest` if the value is NaN or infinite.
    pub fn set_time_of_interest(&self, value: Option<f64>) -> Result<(), ConductorError> {
        if let Some(toi) = value
            && !toi.is_finite()
        {
            return Err(ConductorError::InvalidTimeOfInterest);
        }
        let mut state = self.shared.lock();
        state.time_of_interest = value;
        self.shared.emit(ConductorEvent::TimeOfInterest { value });
        Ok(())
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ConductorSnapshot {
        let state = self.shared.lock();
        ConductorSnapshot {
            time_system: state.time_system.key.clone(),
            mode: state
                .active_clock
                .as_ref()
                .map_or(Mode::Fixed, |active| Mode::Follow {
                    clock: active.clock.key().to_string(),
                }),
            bounds: state.bounds,
            clock_offsets: state.offsets,
            time_of_interest: state.time_of_interest,
        }
    }
}

impl std::fmt::Debug for TimeConductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeConductor")
            .field("state", &self.snapshot())
            .finish()
    }
}

/// Errors returned by conductor setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConductorError {
    /// Bounds failed validation.
    InvalidBounds(BoundsViolation),
    /// Offsets failed validation.
    InvalidOffsets(BoundsViolation),
    /// Time of interest is not a finite number.
    InvalidTimeOfInterest,
    /// No time system is registered under this key.
    UnknownTimeSystem(String),
    /// No clock is registered under this key.
    UnknownClock(String),
    /// No bounds were supplied and the time system has no defaults.
    MissingBounds(String),
    /// No offsets were supplied and none are stored or defaulted.
    MissingOffsets(String),
}

impl std::fmt::Display for ConductorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBounds(violation) => write!(f, "invalid bounds: {violation}"),
            Self::InvalidOffsets(violation) => write!(f, "invalid clock offsets: {violation}"),
            Self::InvalidTimeOfInterest => {
                write!(f, "time of interest must be a finite number")
            }
            Self::UnknownTimeSystem(key) => write!(f, "unknown time system: {key}"),
            Self::UnknownClock(key) => write!(f, "unknown clock: {key}"),
            Self::MissingBounds(key) => {
                write!(f, "no bounds supplied and time system {key} has no default bounds")
            }
            Self::MissingOffsets(key) => {
                write!(f, "no offsets supplied for clock {key} and no defaults available")
            }
        }
    }
}

impl std::error::Error for ConductorError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulatedClock;
    use crate::testing::{drain_events, new_test_conductor};
    use crate::time::clock::{ClockListeners, TickCallback};
    use crate::time::system::TimeSystemDefaults;

    #[test]
    fn test_new_rejects_invalid_bounds() {
        let result = TimeConductor::new(TimeSystem::utc(), TimeBounds::new(2.0, 1.0));
        assert!(matches!(
            result,
            Err(ConductorError::InvalidBounds(BoundsViolation::StartAfterEnd))
        ));
    }

    #[test]
    fn test_set_bounds_round_trip() {
        let conductor = new_test_conductor();
        let mut rx = conductor.subscribe();

        let bounds = TimeBounds::new(-5.5, 10.25);
        conductor.set_bounds(bounds).unwrap();

        assert_eq!(conductor.bounds(), bounds);
        assert_eq!(
            drain_events(&mut rx),
            vec![ConductorEvent::Bounds {
                bounds,
                tick: false
            }]
        );
    }

    #[test]
    fn test_set_bounds_invalid_leaves_state() {
        let conductor = new_test_conductor();
        let mut rx = conductor.subscribe();

        for bad in [
            TimeBounds::new(3000.0, 2000.0),
            TimeBounds::new(f64::NAN, 2000.0),
            TimeBounds::new(0.0, f64::INFINITY),
        ] {
            assert!(matches!(
                conductor.set_bounds(bad),
                Err(ConductorError::InvalidBounds(_))
            ));
        }
        assert_eq!(conductor.bounds(), TimeBounds::new(1000.0, 2000.0));
        assert!(drain_events(&mut rx).is_empty());
    }

    #[test]
    fn test_fixed_to_follow_uses_offsets() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 5000.0));

        conductor
            .set_clock(clock.clone(), Some(ClockOffsets::new(10.0, 5.0)))
            .unwrap();

        assert_eq!(conductor.bounds(), TimeBounds::new(4990.0, 5005.0));
        assert_eq!(
            conductor.mode(),
            Mode::Follow {
                clock: "sim".to_string()
            }
        );
    }

    #[test]
    fn test_follow_defaults_offsets_from_time_system() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 1_000_000.0));

        conductor.set_clock(clock, None).unwrap();

        assert_eq!(
            conductor.clock_offsets(),
            Some(ClockOffsets::new(900_000.0, 0.0))
        );
        assert_eq!(conductor.bounds(), TimeBounds::new(100_000.0, 1_000_000.0));
    }

    #[test]
    fn test_follow_without_any_offsets_fails() {
        let met = TimeSystem::relative("met", "MET", TimeSystemDefaults::default());
        let conductor = TimeConductor::new(met, TimeBounds::new(0.0, 10.0)).unwrap();
        let clock = Arc::new(SimulatedClock::new("sim", 50.0));

        assert_eq!(
            conductor.set_clock(clock, None),
            Err(ConductorError::MissingOffsets("sim".to_string()))
        );
        assert_eq!(conductor.mode(), Mode::Fixed);
        assert_eq!(conductor.bounds(), TimeBounds::new(0.0, 10.0));
    }

    #[test]
    fn test_tick_recomputes_bounds_with_refresh_flag() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 100.0));
        conductor
            .set_clock(clock.clone(), Some(ClockOffsets::new(10.0, 5.0)))
            .unwrap();
        let mut rx = conductor.subscribe();

        clock.set(200.0);

        assert_eq!(conductor.bounds(), TimeBounds::new(190.0, 205.0));
        assert_eq!(
            drain_events(&mut rx),
            vec![ConductorEvent::Bounds {
                bounds: TimeBounds::new(190.0, 205.0),
                tick: true
            }]
        );
    }

    #[test]
    fn test_follow_to_follow_unsubscribes_old_clock() {
        let conductor = new_test_conductor();
        let first = Arc::new(SimulatedClock::new("first", 100.0));
        let second = Arc::new(SimulatedClock::new("second", 500.0));
        let offsets = Some(ClockOffsets::new(10.0, 0.0));

        conductor.set_clock(first.clone(), offsets).unwrap();
        assert_eq!(first.listener_count(), 1);

        conductor.set_clock(second.clone(), None).unwrap();
        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.listener_count(), 1);

        first.set(10_000.0);
        assert_eq!(conductor.bounds(), TimeBounds::new(490.0, 500.0));

        second.set(600.0);
        assert_eq!(conductor.bounds(), TimeBounds::new(590.0, 600.0));
    }

    /// Clock that reports its value on subscribe and keeps every callback it
    /// was given, including unsubscribed ones.
    struct EagerClock {
        value: f64,
        listeners: ClockListeners,
        callbacks: Mutex<Vec<TickCallback>>,
    }

    impl EagerClock {
        fn new(value: f64) -> Self {
            Self {
                value,
                listeners: ClockListeners::new(),
                callbacks: Mutex::new(Vec::new()),
            }
        }

        fn first_callback(&self) -> TickCallback {
            Arc::clone(&self.callbacks.lock().unwrap()[0])
        }
    }

    impl Clock for EagerClock {
        fn key(&self) -> &str {
            "eager"
        }

        fn current_value(&self) -> f64 {
            self.value
        }

        fn listen(&self, callback: TickCallback) -> ListenerHandle {
            callback(self.value);
            self.callbacks.lock().unwrap().push(Arc::clone(&callback));
            self.listeners.add(callback)
        }
    }

    #[test]
    fn test_clock_ticking_inside_listen_does_not_deadlock() {
        let conductor = new_test_conductor();
        let clock = Arc::new(EagerClock::new(100.0));

        let (tx, rx) = std::sync::mpsc::channel();
        let attaching = conductor.clone();
        let attached = Arc::clone(&clock) as Arc<dyn Clock>;
        std::thread::spawn(move || {
            let result = attaching.set_clock(attached, Some(ClockOffsets::new(10.0, 0.0)));
            tx.send(result.is_ok()).unwrap();
        });

        let ok = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("set_clock did not return");
        assert!(ok);
        assert_eq!(conductor.bounds(), TimeBounds::new(90.0, 100.0));
        assert_eq!(
            conductor.mode(),
            Mode::Follow {
                clock: "eager".to_string()
            }
        );
    }

    #[test]
    fn test_stale_tick_ignored_while_other_clock_attached() {
        let conductor = new_test_conductor();
        let first = Arc::new(EagerClock::new(100.0));
        let second = Arc::new(SimulatedClock::new("second", 500.0));
        let offsets = Some(ClockOffsets::new(10.0, 0.0));

        conductor.set_clock(first.clone(), offsets).unwrap();
        let stale = first.first_callback();
        conductor.set_clock(second.clone(), None).unwrap();
        let mut rx = conductor.subscribe();

        stale(10_000.0);
        assert_eq!(conductor.bounds(), TimeBounds::new(490.0, 500.0));
        assert!(drain_events(&mut rx).is_empty());

        second.set(600.0);
        assert_eq!(conductor.bounds(), TimeBounds::new(590.0, 600.0));
    }

    #[test]
    fn test_reattaching_same_clock_keeps_subscription() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 100.0));
        conductor
            .set_clock(clock.clone(), Some(ClockOffsets::new(10.0, 0.0)))
            .unwrap();
        let mut rx = conductor.subscribe();

        conductor
            .set_clock(clock.clone(), Some(ClockOffsets::new(20.0, 0.0)))
            .unwrap();

        assert_eq!(clock.listener_count(), 1);
        let events = drain_events(&mut rx);
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, ConductorEvent::Clock { .. }))
        );
        assert_eq!(conductor.bounds(), TimeBounds::new(80.0, 100.0));
    }

    #[test]
    fn test_follow_to_fixed_freezes_bounds() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 100.0));
        conductor
            .set_clock(clock.clone(), Some(ClockOffsets::new(10.0, 5.0)))
            .unwrap();
        clock.set(300.0);

        conductor.stop_clock();
        assert_eq!(conductor.mode(), Mode::Fixed);
        assert_eq!(clock.listener_count(), 0);

        clock.set(900.0);
        assert_eq!(conductor.bounds(), TimeBounds::new(290.0, 305.0));
    }

    #[test]
    fn test_stop_clock_in_fixed_mode_is_noop() {
        let conductor = new_test_conductor();
        let mut rx = conductor.subscribe();
        conductor.stop_clock();
        assert!(drain_events(&mut rx).is_empty());
    }

    #[test]
    fn test_offsets_rebase_on_true_now() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 2000.0));
        conductor
            .set_clock(clock, Some(ClockOffsets::new(10.0, 5.0)))
            .unwrap();
        let end = conductor.bounds().end;
        assert!((end - 2005.0).abs() < f64::EPSILON);

        conductor
            .set_clock_offsets(ClockOffsets::new(20.0, 0.0))
            .unwrap();

        assert_eq!(conductor.bounds(), TimeBounds::new(end - 5.0 - 20.0, end - 5.0));
    }

    #[test]
    fn test_offsets_example_scenario() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 2000.0));
        conductor
            .set_clock(clock, Some(ClockOffsets::new(1000.0, 0.0)))
            .unwrap();
        assert_eq!(conductor.bounds(), TimeBounds::new(1000.0, 2000.0));

        conductor
            .set_clock_offsets(ClockOffsets::new(300.0, 0.0))
            .unwrap();
        assert_eq!(conductor.bounds(), TimeBounds::new(1700.0, 2000.0));
    }

    #[test]
    fn test_offsets_in_fixed_mode_only_stored() {
        let conductor = new_test_conductor();
        let mut rx = conductor.subscribe();
        conductor
            .set_clock_offsets(ClockOffsets::new(30.0, 3.0))
            .unwrap();

        assert_eq!(conductor.bounds(), TimeBounds::new(1000.0, 2000.0));
        assert_eq!(
            drain_events(&mut rx),
            vec![ConductorEvent::ClockOffsets {
                offsets: ClockOffsets::new(30.0, 3.0)
            }]
        );

        // Stored offsets take precedence over time system defaults.
        let clock = Arc::new(SimulatedClock::new("sim", 100.0));
        conductor.set_clock(clock, None).unwrap();
        assert_eq!(conductor.bounds(), TimeBounds::new(70.0, 103.0));
    }

    #[test]
    fn test_invalid_offsets_rejected() {
        let conductor = new_test_conductor();
        assert!(matches!(
            conductor.set_clock_offsets(ClockOffsets::new(-1.0, 0.0)),
            Err(ConductorError::InvalidOffsets(BoundsViolation::NegativeOffset))
        ));
        assert_eq!(conductor.clock_offsets(), None);
    }

    #[test]
    fn test_time_of_interest() {
        let conductor = new_test_conductor();
        let mut rx = conductor.subscribe();

        conductor.set_time_of_interest(Some(5000.0)).unwrap();
        assert_eq!(conductor.time_of_interest(), Some(5000.0));

        assert_eq!(
            conductor.set_time_of_interest(Some(f64::NAN)),
            Err(ConductorError::InvalidTimeOfInterest)
        );
        assert_eq!(conductor.time_of_interest(), Some(5000.0));

        conductor.set_time_of_interest(None).unwrap();
        assert_eq!(conductor.time_of_interest(), None);
        assert_eq!(
            drain_events(&mut rx),
            vec![
                ConductorEvent::TimeOfInterest {
                    value: Some(5000.0)
                },
                ConductorEvent::TimeOfInterest { value: None },
            ]
        );
    }

    #[test]
    fn test_time_system_change_emits_bounds_after() {
        let conductor = new_test_conductor();
        conductor.add_time_system(TimeSystem::relative(
            "met",
            "MET",
            TimeSystemDefaults {
                bounds: Some(TimeBounds::new(0.0, 60.0)),
                offsets: None,
            },
        ));
        let mut rx = conductor.subscribe();

        conductor.set_time_system("met", None).unwrap();

        assert_eq!(conductor.time_system().key, "met");
        assert_eq!(
            drain_events(&mut rx),
            vec![
                ConductorEvent::TimeSystem {
                    key: "met".to_string()
                },
                ConductorEvent::Bounds {
                    bounds: TimeBounds::new(0.0, 60.0),
                    tick: false
                },
            ]
        );
    }

    #[test]
    fn test_time_system_requires_bounds_in_fixed_mode() {
        let conductor = new_test_conductor();
        assert_eq!(
            conductor.set_time_system("utc", None),
            Err(ConductorError::MissingBounds("utc".to_string()))
        );
        assert_eq!(
            conductor.set_time_system("nope", Some(TimeBounds::new(0.0, 1.0))),
            Err(ConductorError::UnknownTimeSystem("nope".to_string()))
        );
    }

    #[test]
    fn test_time_system_in_follow_mode_derives_bounds() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 400.0));
        conductor
            .set_clock(clock, Some(ClockOffsets::new(100.0, 0.0)))
            .unwrap();

        conductor.set_time_system("utc", None).unwrap();
        assert_eq!(conductor.bounds(), TimeBounds::new(300.0, 400.0));
    }

    #[test]
    fn test_set_mode_by_key() {
        let conductor = new_test_conductor();
        conductor.add_clock(Arc::new(SimulatedClock::new("sim", 50.0)));

        assert_eq!(
            conductor.set_mode(
                Mode::Follow {
                    clock: "missing".to_string()
                },
                None
            ),
            Err(ConductorError::UnknownClock("missing".to_string()))
        );

        conductor
            .set_mode(
                Mode::Follow {
                    clock: "sim".to_string(),
                },
                Some(ClockOffsets::new(5.0, 5.0)),
            )
            .unwrap();
        assert!(conductor.is_following());
        assert_eq!(conductor.bounds(), TimeBounds::new(45.0, 55.0));

        conductor.set_mode(Mode::Fixed, None).unwrap();
        assert!(!conductor.is_following());
    }

    #[test]
    fn test_clock_is_registered_on_attach() {
        let conductor = new_test_conductor();
        let clock = Arc::new(SimulatedClock::new("sim", 50.0));
        conductor
            .set_clock(clock, Some(ClockOffsets::new(1.0, 1.0)))
            .unwrap();
        assert!(conductor.clock_by_key("sim").is_some());
        assert_eq!(conductor.clocks().len(), 1);
    }

    #[test]
    fn test_attach_emits_clock_offsets_bounds_in_order() {
        let conductor = new_test_conductor();
        let mut rx = conductor.subscribe();
        let clock = Arc::new(SimulatedClock::new("sim", 50.0));
        conductor
            .set_clock(clock, Some(ClockOffsets::new(10.0, 0.0)))
            .unwrap();

        assert_eq!(
            drain_events(&mut rx),
            vec![
                ConductorEvent::Clock {
                    key: Some("sim".to_string())
                },
                ConductorEvent::ClockOffsets {
                    offsets: ClockOffsets::new(10.0, 0.0)
                },
                ConductorEvent::Bounds {
                    bounds: TimeBounds::new(40.0, 50.0),
                    tick: false
                },
            ]
        );
    }

    #[test]
    fn test_snapshot() {
        let conductor = new_test_conductor();
        conductor.set_time_of_interest(Some(1500.0)).unwrap();
        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.time_system, "utc");
        assert_eq!(snapshot.mode, Mode::Fixed);
        assert_eq!(snapshot.bounds, TimeBounds::new(1000.0, 2000.0));
        assert_eq!(snapshot.time_of_interest, Some(1500.0));
    }
}
