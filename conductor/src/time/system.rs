//! Time systems.
//!
//! A time system gives meaning to the numbers stored in bounds: which epoch
//! they count from and in what units. Bounds from one time system are
//! meaningless in another, so switching systems always supplies new bounds.

use serde::{Deserialize, Serialize};

use crate::time::bounds::{ClockOffsets, TimeBounds};

/// Key of the built-in UTC time system.
pub const UTC_TIME_SYSTEM: &str = "utc";

/// Per-mode defaults of a time system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSystemDefaults {
    /// Bounds used when the system is selected in fixed mode.
    pub bounds: Option<TimeBounds>,
    /// Offsets used when a clock is attached without explicit offsets.
    pub offsets: Option<ClockOffsets>,
}

/// Description of a time system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSystem {
    pub key: String,
    pub name: String,
    /// Whether timestamps are milliseconds since the Unix epoch.
    pub utc_based: bool,
    /// Key of the format used to display timestamps.
    pub time_format: String,
    /// Key of the format used to display durations.
    pub duration_format: String,
    pub defaults: TimeSystemDefaults,
}

impl TimeSystem {
    /// The UTC time system: milliseconds since the Unix epoch, following the
    /// last fifteen minutes by default.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            key: UTC_TIME_SYSTEM.to_string(),
            name: "UTC".to_string(),
            utc_based: true,
            time_format: "utc".to_string(),
            duration_format: "duration".to_string(),
            defaults: TimeSystemDefaults {
                bounds: None,
                offsets: Some(ClockOffsets::new(15.0 * 60.0 * 1000.0, 0.0)),
            },
        }
    }

    /// A relative time system such as mission elapsed time.
    #[must_use]
    pub fn relative(key: &str, name: &str, defaults: TimeSystemDefaults) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            utc_based: false,
            time_format: key.to_string(),
            duration_format: "duration".to_string(),
            defaults,
        }
    }

    #[must_use]
    pub const fn is_utc_based(&self) -> bool {
        self.utc_based
    }

    #[must_use]
    pub const fn defaults(&self) -> &TimeSystemDefaults {
        &self.defaults
    }

    #[must_use]
    pub const fn with_defaults(mut self, defaults: TimeSystemDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}
