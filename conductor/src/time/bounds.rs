//! Time bounds and clock offsets.
//!
//! Bounds are absolute timestamps in the units of the active time system.
//! Offsets are non-negative durations applied around "now" while a clock is
//! followed.
//!
//! # Invariants
//!
//! - A validated `TimeBounds` has finite `start` and `end` with `start <= end`
//! - A validated `ClockOffsets` has finite, non-negative `start` and `end`

use serde::{Deserialize, Serialize};

/// The visible time window, in the active time system's units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub start: f64,
    pub end: f64,
}

impl TimeBounds {
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Bounds placed around `now` using the given offsets.
    #[must_use]
    pub fn around(now: f64, offsets: ClockOffsets) -> Self {
        Self {
            start: now - offsets.start,
            end: now + offsets.end,
        }
    }

    /// Width of the window.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Durations subtracted from (start) and added to (end) the current tick
/// to derive follow-mode bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockOffsets {
    pub start: f64,
    pub end: f64,
}

impl ClockOffsets {
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Reason a bounds or offsets value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsViolation {
    /// `start` is NaN or infinite.
    StartNotFinite,
    /// `end` is NaN or infinite.
    EndNotFinite,
    /// `start` is after `end`.
    StartAfterEnd,
    /// An offset is negative.
    NegativeOffset,
}

impl std::fmt::Display for BoundsViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartNotFinite => write!(f, "start must be a finite number"),
            Self::EndNotFinite => write!(f, "end must be a finite number"),
            Self::StartAfterEnd => write!(f, "start must not be after end"),
            Self::NegativeOffset => write!(f, "offsets must not be negative"),
        }
    }
}

/// Validate a bounds value.
///
/// # Errors
///
/// Returns the first violated rule: non-finite start, non-finite end, then
/// `start > end`.
pub fn validate_bounds(bounds: &TimeBounds) -> Result<(), BoundsViolation> {
    if !bounds.start.is_finite() {
        return Err(BoundsViolation::StartNotFinite);
    }
    if !bounds.end.is_finite() {
        return Err(BoundsViolation::EndNotFinite);
    }
    if bounds.start > bounds.end {
        return Err(BoundsViolation::StartAfterEnd);
    }
    Ok(())
}

/// Validate an offsets value.
///
/// # Errors
///
/// Returns the first violated rule: non-finite start, non-finite end, then a
/// negative component.
pub fn validate_offsets(offsets: &ClockOffsets) -> Result<(), BoundsViolation> {
    if !offsets.start.is_finite() {
        return Err(BoundsViolation::StartNotFinite);
    }
    if !offsets.end.is_finite() {
        return Err(BoundsViolation::EndNotFinite);
    }
    if offsets.start < 0.0 || offsets.end < 0.0 {
        return Err(BoundsViolation::NegativeOffset);
    }
    Ok(())
}

/// Rebase follow-mode bounds onto new offsets.
///
/// The true "now" is recovered from the current bounds by removing the old
/// end offset, so repeated offset changes never accumulate drift.
#[must_use]
pub fn rebase_bounds(
    current: TimeBounds,
    previous: ClockOffsets,
    next: ClockOffsets,
) -> TimeBounds {
    let now = current.end - previous.end;
    TimeBounds::around(now, next)
}
