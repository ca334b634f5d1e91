//! Time conductor state mirrored in URL query parameters.
//!
//! Lets a view share its time settings through a link.
//!
//! # Parameters
//!
//! - `tc.mode`: `fixed`, or the key of the followed clock
//! - `tc.timeSystem`: key of the time system
//! - `tc.startBound`, `tc.endBound`: bounds, written in fixed mode
//! - `tc.startDelta`, `tc.endDelta`: offsets, written in follow mode
//!
//! `tc.startDelta` holds the start offset negated (a window reaching 15
//! minutes into the past is written as `-900000`) and is negated again on
//! read.
//!
//! # Invariants
//!
//! - `parse(capture(c).to_query_string())` reproduces `capture(c)` exactly
//! - Applying a captured state to a conductor with the same registries
//!   reproduces the captured mode, time system, bounds (fixed) and offsets
//!   (follow)

use serde::{Deserialize, Serialize};

use crate::time::{
    ClockOffsets, ConductorError, Mode, TimeBounds, TimeConductor, validate_bounds,
    validate_offsets,
};

/// Mode value meaning "no clock".
pub const FIXED_MODE: &str = "fixed";

#[derive(Debug, Default, Serialize, Deserialize)]
struct UrlParams {
    #[serde(rename = "tc.mode", skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(rename = "tc.timeSystem", skip_serializing_if = "Option::is_none")]
    time_system: Option<String>,
    #[serde(rename = "tc.startBound", skip_serializing_if = "Option::is_none")]
    start_bound: Option<f64>,
    #[serde(rename = "tc.endBound", skip_serializing_if = "Option::is_none")]
    end_bound: Option<f64>,
    #[serde(rename = "tc.startDelta", skip_serializing_if = "Option::is_none")]
    start_delta: Option<f64>,
    #[serde(rename = "tc.endDelta", skip_serializing_if = "Option::is_none")]
    end_delta: Option<f64>,
}

/// Time state carried by a URL. Every part is optional; absent parts are
/// left unchanged on apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlTimeState {
    pub mode: Option<Mode>,
    pub time_system: Option<String>,
    pub bounds: Option<TimeBounds>,
    pub offsets: Option<ClockOffsets>,
}

impl UrlTimeState {
    /// Capture the conductor's current state.
    ///
    /// Fixed mode records bounds; follow mode records offsets, since its
    /// bounds are derived from the clock.
    #[must_use]
    pub fn capture(conductor: &TimeConductor) -> Self {
        let snapshot = conductor.snapshot();
        let (bounds, offsets) = match snapshot.mode {
            Mode::Fixed => (Some(snapshot.bounds), None),
            Mode::Follow { .. } => (None, snapshot.clock_offsets),
        };
        Self {
            mode: Some(snapshot.mode),
            time_system: Some(snapshot.time_system),
            bounds,
            offsets,
        }
    }

    /// Parse a query string (without the leading `?`).
    ///
    /// Parameters outside the `tc.` namespace are ignored.
    ///
    /// # Errors
    ///
    /// - `Malformed` if a value cannot be decoded (for example a
    ///   non-numeric bound)
    /// - `IncompleteBounds` / `IncompleteOffsets` if only one half of a pair
    ///   is present
    pub fn parse(query: &str) -> Result<Self, UrlStateError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let params: UrlParams = serde_urlencoded::from_str(query)
            .map_err(|e| UrlStateError::Malformed(e.to_string()))?;

        let mode = params.mode.map(|mode| {
            if mode == FIXED_MODE {
                Mode::Fixed
            } else {
                Mode::Follow { clock: mode }
            }
        });

        let bounds = match (params.start_bound, params.end_bound) {
            (Some(start), Some(end)) => Some(TimeBounds::new(start, end)),
            (None, None) => None,
            _ => return Err(UrlStateError::IncompleteBounds),
        };

        let offsets = match (params.start_delta, params.end_delta) {
            (Some(start), Some(end)) => Some(ClockOffsets::new(-start, end)),
            (None, None) => None,
            _ => return Err(UrlStateError::IncompleteOffsets),
        };

        Ok(Self {
            mode,
            time_system: params.time_system,
            bounds,
            offsets,
        })
    }

    /// Encode as a query string (without the leading `?`).
    ///
    /// # Errors
    ///
    /// Returns `Encode` if the parameters cannot be serialized.
    pub fn to_query_string(&self) -> Result<String, UrlStateError> {
        let params = UrlParams {
            mode: self.mode.as_ref().map(|mode| match mode {
                Mode::Fixed => FIXED_MODE.to_string(),
                Mode::Follow { clock } => clock.clone(),
            }),
            time_system: self.time_system.clone(),
            start_bound: self.bounds.map(|bounds| bounds.start),
            end_bound: self.bounds.map(|bounds| bounds.end),
            start_delta: self.offsets.map(|offsets| -offsets.start),
            end_delta: self.offsets.map(|offsets| offsets.end),
        };
        serde_urlencoded::to_string(&params).map_err(|e| UrlStateError::Encode(e.to_string()))
    }

    /// Apply to a conductor.
    ///
    /// Bounds and offsets are validated, and the clock and time system keys
    /// resolved, before anything changes. Order of application: mode
    /// (attaching the clock with the carried offsets), time system, then
    /// bounds or offsets.
    ///
    /// # Errors
    ///
    /// Returns `Conductor` with the first failure. Invalid values, unknown
    /// keys, and a fixed-mode time system change with no bounds to use all
    /// leave the conductor untouched.
    pub fn apply(&self, conductor: &TimeConductor) -> Result<(), UrlStateError> {
        if let Some(bounds) = &self.bounds {
            validate_bounds(bounds).map_err(ConductorError::InvalidBounds)?;
        }
        if let Some(offsets) = &self.offsets {
            validate_offsets(offsets).map_err(ConductorError::InvalidOffsets)?;
        }
        self.resolve(conductor)?;

        let mut offsets_applied = false;
        match &self.mode {
            Some(Mode::Fixed) => conductor.stop_clock(),
            Some(Mode::Follow { clock }) => {
                conductor.set_clock_by_key(clock, self.offsets)?;
                offsets_applied = self.offsets.is_some();
            }
            None => {}
        }

        let mut bounds_applied = false;
        if let Some(key) = &self.time_system
            && conductor.time_system().key != *key
        {
            let bounds = if conductor.is_following() {
                None
            } else {
                self.bounds
            };
            conductor.set_time_system(key, bounds)?;
            bounds_applied = bounds.is_some();
        }

        if !bounds_applied && let Some(bounds) = self.bounds {
            conductor.set_bounds(bounds)?;
        }
        if !offsets_applied && let Some(offsets) = self.offsets {
            conductor.set_clock_offsets(offsets)?;
        }
        Ok(())
    }

    /// Check every registry lookup `apply` will make.
    fn resolve(&self, conductor: &TimeConductor) -> Result<(), ConductorError> {
        let following = match &self.mode {
            Some(Mode::Follow { clock }) => {
                if conductor.clock_by_key(clock).is_none() {
                    return Err(ConductorError::UnknownClock(clock.clone()));
                }
                true
            }
            Some(Mode::Fixed) => false,
            None => conductor.is_following(),
        };

        if let Some(key) = &self.time_system
            && conductor.time_system().key != *key
        {
            let time_system = conductor
                .time_systems()
                .into_iter()
                .find(|time_system| time_system.key == *key)
                .ok_or_else(|| ConductorError::UnknownTimeSystem(key.clone()))?;
            if !following && self.bounds.is_none() && time_system.defaults.bounds.is_none() {
                return Err(ConductorError::MissingBounds(key.clone()));
            }
        }
        Ok(())
    }
}

/// Errors from reading, writing or applying URL time state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlStateError {
    /// The query string could not be decoded.
    Malformed(String),
    /// The parameters could not be encoded.
    Encode(String),
    /// Only one of `tc.startBound` and `tc.endBound` was present.
    IncompleteBounds,
    /// Only one of `tc.startDelta` and `tc.endDelta` was present.
    IncompleteOffsets,
    /// The conductor rejected the state.
    Conductor(ConductorError),
}

impl std::fmt::Display for UrlStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "malformed time parameters: {message}"),
            Self::Encode(message) => write!(f, "failed to encode time parameters: {message}"),
            Self::IncompleteBounds => {
                write!(f, "tc.startBound and tc.endBound must be given together")
            }
            Self::IncompleteOffsets => {
                write!(f, "tc.startDelta and tc.endDelta must be given together")
            }
            Self::Conductor(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for UrlStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Conductor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConductorError> for UrlStateError {
    fn from(e: ConductorError) -> Self {
        Self::Conductor(e)
    }
}
