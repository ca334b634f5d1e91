//! Time conductor: bounds, time systems, clocks and follow-mode offsets.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use conductor::simulation::SimulatedClock;
//! use conductor::time::{ClockOffsets, TimeBounds, TimeConductor, TimeSystem};
//!
//! let conductor = TimeConductor::new(TimeSystem::utc(), TimeBounds::new(0.0, 10.0)).unwrap();
//! let clock = Arc::new(SimulatedClock::new("sim", 1000.0));
//!
//! // Follow the clock, showing the last 10ms and the next 5ms.
//! conductor.set_clock(clock.clone(), Some(ClockOffsets::new(10.0, 5.0))).unwrap();
//! assert_eq!(conductor.bounds(), TimeBounds::new(990.0, 1005.0));
//!
//! clock.advance(100.0);
//! assert_eq!(conductor.bounds(), TimeBounds::new(1090.0, 1105.0));
//! ```

mod bounds;
mod clock;
mod conductor;
mod event;
mod source;
mod system;

pub use bounds::{
    BoundsViolation, ClockOffsets, TimeBounds, rebase_bounds, validate_bounds, validate_offsets,
};
pub use clock::{Clock, ClockListeners, LOCAL_CLOCK, ListenerHandle, LocalClock, TickCallback};
pub use conductor::{ConductorError, ConductorSnapshot, Mode, TimeConductor};
pub use event::{ConductorEvent, EVENT_CHANNEL_CAPACITY, EventReceiver};
pub use source::{SystemTimeSource, TimeSource};
pub use system::{TimeSystem, TimeSystemDefaults, UTC_TIME_SYSTEM};
