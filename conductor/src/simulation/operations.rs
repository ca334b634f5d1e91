//! Random operation generation for simulation.
//!
//! Generates a reproducible stream of conductor operations from a seed. A
//! configurable share of operations carry invalid input (reversed bounds,
//! NaN, negative offsets) to exercise the rejection paths.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::time::{ClockOffsets, TimeBounds};

/// One step of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    SetBounds(TimeBounds),
    SetOffsets(ClockOffsets),
    /// Follow the simulated clock at `clock` (an index into the simulator's
    /// clocks).
    Follow {
        clock: usize,
        offsets: Option<ClockOffsets>,
    },
    StopClock,
    /// Advance the simulated clock at `clock`, producing a tick.
    Tick { clock: usize, advance: f64 },
    SetTimeOfInterest(Option<f64>),
    SetTimeSystem {
        key: String,
        bounds: Option<TimeBounds>,
    },
}

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct OperationGenConfig {
    /// Probability that a generated value is invalid.
    pub invalid_rate: f64,
    /// Number of simulated clocks operations may reference.
    pub clock_count: usize,
    /// Keys of time systems operations may select. May include unknown keys.
    pub time_systems: Vec<String>,
}

impl Default for OperationGenConfig {
    fn default() -> Self {
        Self {
            invalid_rate: 0.1,
            clock_count: 2,
            // "tai" is never registered, so selecting it must be rejected.
            time_systems: vec![
                "utc".to_string(),
                "met".to_string(),
                "tai".to_string(),
            ],
        }
    }
}

/// Seeded generator of operations.
pub struct OperationGenerator {
    rng: StdRng,
    config: OperationGenConfig,
}

impl OperationGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, OperationGenConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: OperationGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        match self.rng.random_range(0..10u8) {
            0 | 1 => Operation::SetBounds(self.bounds()),
            2 => Operation::SetOffsets(self.offsets()),
            3 => Operation::Follow {
                clock: self.clock_index(),
                offsets: self.rng.random_bool(0.5).then(|| self.offsets()),
            },
            4 => Operation::StopClock,
            5..=7 => Operation::Tick {
                clock: self.clock_index(),
                advance: f64::from(self.rng.random_range(0..5_000u32)),
            },
            8 => Operation::SetTimeOfInterest(self.time_of_interest()),
            _ => {
                let index = self.rng.random_range(0..self.config.time_systems.len().max(1));
                let key = self
                    .config
                    .time_systems
                    .get(index)
                    .cloned()
                    .unwrap_or_default();
                Operation::SetTimeSystem {
                    key,
                    bounds: self.rng.random_bool(0.7).then(|| self.bounds()),
                }
            }
        }
    }

    fn invalid(&mut self) -> bool {
        self.rng.random_bool(self.config.invalid_rate)
    }

    fn clock_index(&mut self) -> usize {
        self.rng.random_range(0..self.config.clock_count.max(1))
    }

    fn bounds(&mut self) -> TimeBounds {
        let start = f64::from(self.rng.random_range(0..10_000_000u32));
        let span = f64::from(self.rng.random_range(0..1_000_000u32));
        if self.invalid() {
            return if self.rng.random_bool(0.5) {
                TimeBounds::new(start + span + 1.0, start)
            } else {
                TimeBounds::new(f64::NAN, start)
            };
        }
        TimeBounds::new(start, start + span)
    }

    fn offsets(&mut self) -> ClockOffsets {
        let start = f64::from(self.rng.random_range(0..1_000_000u32));
        let end = f64::from(self.rng.random_range(0..100_000u32));
        if self.invalid() {
            return ClockOffsets::new(-start - 1.0, end);
        }
        ClockOffsets::new(start, end)
    }

    fn time_of_interest(&mut self) -> Option<f64> {
        if self.rng.random_bool(0.2) {
            return None;
        }
        if self.invalid() {
            return Some(f64::INFINITY);
        }
        Some(f64::from(self.rng.random_range(0..10_000_000u32)))
    }
}
