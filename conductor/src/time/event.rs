//! Conductor change notifications.
//!
//! Every successful mutation of the conductor emits one or more events on a
//! broadcast channel. Events are emitted in mutation order; a time system
//! change is always followed by a bounds event.

use serde::{Deserialize, Serialize};

use crate::time::bounds::{ClockOffsets, TimeBounds};

/// Capacity of the conductor's broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A change to conductor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
#[allow(clippy::disallowed_methods)] // Clone needed for broadcast channel
pub enum ConductorEvent {
    /// Bounds changed. `tick` is set when the change came from a clock tick,
    /// telling views to re-query rather than reset.
    Bounds { bounds: TimeBounds, tick: bool },
    /// A new time system was selected. Always followed by `Bounds`.
    TimeSystem { key: String },
    /// A clock was attached (`Some`) or detached (`None`).
    Clock { key: Option<String> },
    /// Follow-mode offsets changed.
    ClockOffsets { offsets: ClockOffsets },
    /// The time of interest was set or cleared.
    TimeOfInterest { value: Option<f64> },
}

/// Receiver half of the conductor's event channel.
pub type EventReceiver = tokio::sync::broadcast::Receiver<ConductorEvent>;
