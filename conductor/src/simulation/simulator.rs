//! Main simulator harness for deterministic simulation testing.
//!
//! Drives a [`TimeConductor`] with a seeded stream of operations against
//! simulated clocks, checking invariants after every step.

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use crate::time::{
    Clock, ClockOffsets, ConductorError, ConductorEvent, EventReceiver, TimeBounds,
    TimeConductor, TimeSystem, TimeSystemDefaults,
};

use super::clock::SimulatedClock;
use super::invariants::{InvariantChecker, InvariantViolation, OperationHistory};
use super::operations::{Operation, OperationGenConfig, OperationGenerator};

/// Initial value of the first simulated clock. Each further clock starts
/// this much later.
const CLOCK_START: f64 = 1_000_000.0;

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Operation generation configuration.
    pub operation_config: OperationGenConfig,
}

impl SimulatorConfig {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            operation_config: OperationGenConfig::default(),
        }
    }

    #[must_use]
    pub fn with_operation_config(mut self, config: OperationGenConfig) -> Self {
        self.operation_config = config;
        self
    }

    /// Set the share of operations carrying invalid input.
    #[must_use]
    pub const fn with_invalid_rate(mut self, rate: f64) -> Self {
        self.operation_config.invalid_rate = rate;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    pub operations_processed: u64,
    /// Operations the conductor accepted.
    pub accepted_operations: u64,
    /// Operations the conductor rejected (expected for invalid input).
    pub rejected_operations: u64,
    pub invariant_violations: Vec<InvariantViolation>,
    /// Whether the simulation completed without a setup failure.
    pub completed_successfully: bool,
    /// Error message if the simulation could not run.
    pub error: Option<String>,
}

impl SimulationResult {
    /// Check if the simulation passed (no invariant violations).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.completed_successfully && self.invariant_violations.is_empty()
    }
}

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    generator: OperationGenerator,
    history: OperationHistory,
    checker: InvariantChecker,
    clocks: Vec<Arc<SimulatedClock>>,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator =
            OperationGenerator::with_config(config.seed, config.operation_config.clone());
        let clocks = (0..config.operation_config.clock_count.max(1))
            .map(|index| {
                let offset = f64::from(u32::try_from(index).unwrap_or(u32::MAX));
                Arc::new(SimulatedClock::new(
                    &format!("sim-{index}"),
                    CLOCK_START * (1.0 + offset),
                ))
            })
            .collect();
        Self {
            config,
            generator,
            history: OperationHistory::new(),
            checker: InvariantChecker::new(),
            clocks,
        }
    }

    /// Run the simulation for a given number of operations.
    ///
    /// Creates a fresh conductor in fixed mode, registers the simulated
    /// clocks and a relative time system, then applies generated operations.
    pub fn run(&mut self, operation_count: usize) -> SimulationResult {
        let conductor = match TimeConductor::new(
            TimeSystem::utc(),
            TimeBounds::new(CLOCK_START - 1000.0, CLOCK_START),
        ) {
            Ok(conductor) => conductor,
            Err(e) => {
                return SimulationResult {
                    seed: self.config.seed,
                    operations_processed: 0,
                    accepted_operations: 0,
                    rejected_operations: 0,
                    invariant_violations: vec![],
                    completed_successfully: false,
                    error: Some(format!("Failed to create conductor: {e}")),
                };
            }
        };
        conductor.add_time_system(TimeSystem::relative(
            "met",
            "Mission Elapsed Time",
            TimeSystemDefaults {
                bounds: Some(TimeBounds::new(0.0, 86_400_000.0)),
                offsets: Some(ClockOffsets::new(60_000.0, 0.0)),
            },
        ));
        for clock in &self.clocks {
            conductor.add_clock(Arc::clone(clock) as Arc<dyn Clock>);
        }

        let mut events = conductor.subscribe();
        for _ in 0..operation_count {
            let operation = self.generator.next_operation();
            self.step(&conductor, &mut events, operation);
        }

        let stats = self.history.stats();
        SimulationResult {
            seed: self.config.seed,
            operations_processed: stats.total_operations as u64,
            accepted_operations: stats.accepted,
            rejected_operations: stats.rejected,
            invariant_violations: self.checker.violations().to_vec(),
            completed_successfully: true,
            error: None,
        }
    }

    fn step(
        &mut self,
        conductor: &TimeConductor,
        events: &mut EventReceiver,
        operation: Operation,
    ) {
        let index = self.history.len();
        let before = conductor.snapshot();
        let outcome = self.apply(conductor, &operation);
        let after = conductor.snapshot();
        let emitted = drain(events);

        self.checker.check_state(&after, index);
        self.checker.check_events(&emitted, &after, index);
        match &outcome {
            Ok(()) => {
                let clock_value = self.referenced_clock(&operation).map(|clock| {
                    (clock.key().to_string(), clock.current_value())
                });
                self.checker.check_accepted(
                    &operation,
                    clock_value,
                    &before,
                    &after,
                    &emitted,
                    index,
                );
            }
            Err(error) => {
                tracing::trace!(index, %error, "operation rejected");
                self.checker.check_unchanged(&before, &after, &emitted, index);
            }
        }
        self.history
            .record(operation, outcome.err().map(|error| error.to_string()));
    }

    fn apply(
        &self,
        conductor: &TimeConductor,
        operation: &Operation,
    ) -> Result<(), ConductorError> {
        match operation {
            Operation::SetBounds(bounds) => conductor.set_bounds(*bounds),
            Operation::SetOffsets(offsets) => conductor.set_clock_offsets(*offsets),
            Operation::Follow { clock, offsets } => match self.clocks.get(*clock) {
                Some(clock) => conductor.set_clock_by_key(clock.key(), *offsets),
                None => Err(ConductorError::UnknownClock(clock.to_string())),
            },
            Operation::StopClock => {
                conductor.stop_clock();
                Ok(())
            }
            Operation::Tick { clock, advance } => {
                if let Some(clock) = self.clocks.get(*clock) {
                    clock.advance(*advance);
                }
                Ok(())
            }
            Operation::SetTimeOfInterest(value) => conductor.set_time_of_interest(*value),
            Operation::SetTimeSystem { key, bounds } => conductor.set_time_system(key, *bounds),
        }
    }

    fn referenced_clock(&self, operation: &Operation) -> Option<&Arc<SimulatedClock>> {
        match operation {
            Operation::Follow { clock, .. } | Operation::Tick { clock, .. } => {
                self.clocks.get(*clock)
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn history(&self) -> &OperationHistory {
        &self.history
    }

    #[must_use]
    pub const fn checker(&self) -> &InvariantChecker {
        &self.checker
    }
}

fn drain(events: &mut EventReceiver) -> Vec<ConductorEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
