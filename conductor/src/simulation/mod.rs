//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! This module provides tools for testing the conductor with:
//! - Controlled clocks (no real system time)
//! - Reproducible random operation generation
//! - Invariant checking after each operation
//!
//! Given the same seed, a run applies the same operations and observes the
//! same results.
//!
//! # Usage
//!
//! ```
//! use conductor::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_invalid_rate(0.1);
//!
//! let mut sim = Simulator::new(config);
//! let result = sim.run(1000);
//!
//! assert!(result.invariant_violations.is_empty());
//! ```

mod clock;
mod invariants;
mod operations;
mod simulator;

pub use clock::SimulatedClock;
pub use invariants::{
    HistoryStats, InvariantChecker, InvariantViolation, OperationHistory, OperationRecord,
};
pub use operations::{Operation, OperationGenConfig, OperationGenerator};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
