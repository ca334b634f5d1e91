//! Invariant checking for deterministic simulation testing.
//!
//! The checker compares conductor snapshots taken before and after each
//! operation, together with the events the operation emitted.

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use crate::time::{
    ClockOffsets, ConductorEvent, ConductorSnapshot, Mode, TimeBounds, rebase_bounds,
    validate_bounds, validate_offsets,
};

use super::operations::Operation;

/// A recorded operation in the simulation.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation: Operation,
    /// Whether the conductor accepted the operation.
    pub accepted: bool,
    /// Error message if rejected.
    pub error: Option<String>,
}

/// Tracks the history of operations.
#[derive(Debug, Default)]
pub struct OperationHistory {
    records: Vec<OperationRecord>,
    accepted: u64,
    rejected: u64,
}

impl OperationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, operation: Operation, error: Option<String>) {
        let accepted = error.is_none();
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        self.records.push(OperationRecord {
            operation,
            accepted,
            error,
        });
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_operations: self.records.len(),
            accepted: self.accepted,
            rejected: self.rejected,
        }
    }
}

/// Statistics about the operation history.
#[derive(Debug, Clone)]
pub struct HistoryStats {
    pub total_operations: usize,
    pub accepted: u64,
    pub rejected: u64,
}

/// An invariant violation detected during simulation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Operation index where it was detected.
    pub operation_index: usize,
    /// Additional context.
    pub context: String,
}

/// Checker for conductor invariants.
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
}

impl Default for InvariantChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantChecker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn clear(&mut self) {
        self.violations.clear();
    }

    pub fn add_violation(&mut self, violation: InvariantViolation) {
        self.violations.push(violation);
    }

    fn violation(&mut self, description: &str, operation_index: usize, context: String) {
        self.violations.push(InvariantViolation {
            description: description.to_string(),
            operation_index,
            context,
        });
    }

    /// Stored bounds and offsets are always valid.
    pub fn check_state(&mut self, snapshot: &ConductorSnapshot, operation_index: usize) {
        if let Err(violation) = validate_bounds(&snapshot.bounds) {
            self.violation(
                "Stored bounds are invalid",
                operation_index,
                format!("{:?}: {violation}", snapshot.bounds),
            );
        }
        if let Some(offsets) = &snapshot.clock_offsets
            && let Err(violation) = validate_offsets(offsets)
        {
            self.violation(
                "Stored offsets are invalid",
                operation_index,
                format!("{offsets:?}: {violation}"),
            );
        }
        if let Some(toi) = snapshot.time_of_interest
            && !toi.is_finite()
        {
            self.violation(
                "Stored time of interest is not finite",
                operation_index,
                format!("{toi}"),
            );
        }
    }

    /// Emitted events are well-formed and agree with the resulting state.
    pub fn check_events(
        &mut self,
        events: &[ConductorEvent],
        after: &ConductorSnapshot,
        operation_index: usize,
    ) {
        for (position, event) in events.iter().enumerate() {
            match event {
                ConductorEvent::TimeSystem { key } => {
                    if !matches!(events.get(position + 1), Some(ConductorEvent::Bounds { .. })) {
                        self.violation(
                            "TimeSystem event not followed by Bounds",
                            operation_index,
                            format!("time system {key}"),
                        );
                    }
                }
                ConductorEvent::Bounds { bounds, .. } => {
                    if let Err(violation) = validate_bounds(bounds) {
                        self.violation(
                            "Bounds event carries invalid bounds",
                            operation_index,
                            format!("{bounds:?}: {violation}"),
                        );
                    }
                }
                ConductorEvent::ClockOffsets { offsets } => {
                    if let Err(violation) = validate_offsets(offsets) {
                        self.violation(
                            "ClockOffsets event carries invalid offsets",
                            operation_index,
                            format!("{offsets:?}: {violation}"),
                        );
                    }
                }
                ConductorEvent::Clock { .. } | ConductorEvent::TimeOfInterest { .. } => {}
            }
        }

        let last_bounds = events.iter().rev().find_map(|event| match event {
            ConductorEvent::Bounds { bounds, .. } => Some(*bounds),
            _ => None,
        });
        if let Some(bounds) = last_bounds
            && bounds != after.bounds
        {
            self.violation(
                "Last Bounds event disagrees with stored bounds",
                operation_index,
                format!("event {bounds:?}, stored {:?}", after.bounds),
            );
        }
    }

    /// A rejected operation changes nothing and emits nothing.
    pub fn check_unchanged(
        &mut self,
        before: &ConductorSnapshot,
        after: &ConductorSnapshot,
        events: &[ConductorEvent],
        operation_index: usize,
    ) {
        if before != after {
            self.violation(
                "Rejected operation changed state",
                operation_index,
                format!("before {before:?}, after {after:?}"),
            );
        }
        if !events.is_empty() {
            self.violation(
                "Rejected operation emitted events",
                operation_index,
                format!("{events:?}"),
            );
        }
    }

    /// Check the effect of an accepted operation.
    ///
    /// `clock_value` is the value of the clock the operation referenced,
    /// read after the operation ran.
    pub fn check_accepted(
        &mut self,
        operation: &Operation,
        clock_value: Option<(String, f64)>,
        before: &ConductorSnapshot,
        after: &ConductorSnapshot,
        events: &[ConductorEvent],
        operation_index: usize,
    ) {
        match operation {
            Operation::SetBounds(bounds) => {
                self.expect_bounds(*bounds, after.bounds, operation_index);
            }
            Operation::SetOffsets(offsets) => {
                self.expect_offsets(*offsets, after, operation_index);
                let expected = match (&before.mode, before.clock_offsets) {
                    (Mode::Follow { .. }, Some(previous)) => {
                        rebase_bounds(before.bounds, previous, *offsets)
                    }
                    _ => before.bounds,
                };
                self.expect_bounds(expected, after.bounds, operation_index);
            }
            Operation::Follow { offsets, .. } => {
                if let Some(offsets) = offsets {
                    self.expect_offsets(*offsets, after, operation_index);
                }
                if let Some((key, value)) = clock_value {
                    self.check_following(&key, value, after, operation_index);
                }
            }
            Operation::StopClock => {
                if after.mode != Mode::Fixed {
                    self.violation(
                        "Still following after stop",
                        operation_index,
                        format!("{:?}", after.mode),
                    );
                }
                self.expect_bounds(before.bounds, after.bounds, operation_index);
            }
            Operation::Tick { .. } => {
                let Some((key, value)) = clock_value else {
                    return;
                };
                if before.mode == (Mode::Follow { clock: key.clone() }) {
                    self.check_following(&key, value, after, operation_index);
                } else {
                    self.check_unchanged(before, after, events, operation_index);
                }
            }
            Operation::SetTimeOfInterest(value) => {
                if after.time_of_interest != *value {
                    self.violation(
                        "Time of interest not applied",
                        operation_index,
                        format!("expected {value:?}, got {:?}", after.time_of_interest),
                    );
                }
            }
            Operation::SetTimeSystem { key, bounds } => {
                if &after.time_system != key {
                    self.violation(
                        "Time system not applied",
                        operation_index,
                        format!("expected {key}, got {}", after.time_system),
                    );
                }
                if let Some(bounds) = bounds {
                    self.expect_bounds(*bounds, after.bounds, operation_index);
                }
            }
        }
    }

    /// In follow mode, bounds sit around the clock's current value.
    fn check_following(
        &mut self,
        key: &str,
        value: f64,
        after: &ConductorSnapshot,
        operation_index: usize,
    ) {
        if after.mode != (Mode::Follow { clock: key.to_string() }) {
            self.violation(
                "Not following the expected clock",
                operation_index,
                format!("expected {key}, got {:?}", after.mode),
            );
            return;
        }
        let Some(offsets) = after.clock_offsets else {
            self.violation(
                "Following without offsets",
                operation_index,
                format!("clock {key}"),
            );
            return;
        };
        self.expect_bounds(TimeBounds::around(value, offsets), after.bounds, operation_index);
    }

    fn expect_bounds(&mut self, expected: TimeBounds, actual: TimeBounds, operation_index: usize) {
        if expected != actual {
            self.violation(
                "Unexpected bounds",
                operation_index,
                format!("expected {expected:?}, got {actual:?}"),
            );
        }
    }

    fn expect_offsets(
        &mut self,
        expected: ClockOffsets,
        after: &ConductorSnapshot,
        operation_index: usize,
    ) {
        if after.clock_offsets != Some(expected) {
            self.violation(
                "Unexpected offsets",
                operation_index,
                format!("expected {expected:?}, got {:?}", after.clock_offsets),
            );
        }
    }
}
