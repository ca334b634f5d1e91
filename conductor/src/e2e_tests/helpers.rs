//! Common helpers for end-to-end tests.

use std::sync::Arc;

use tempfile::TempDir;

use crate::object::FileObjectStore;
use crate::service::ConductorService;
use crate::simulation::SimulatedClock;
pub use crate::testing::drain_events;
use crate::time::{ClockOffsets, TimeBounds, TimeConductor, TimeSystem, TimeSystemDefaults};

/// Key of the simulated clock every test server registers.
pub const CLOCK: &str = "sim";

/// Initial bounds of a fresh test server.
pub const INITIAL_BOUNDS: TimeBounds = TimeBounds::new(1000.0, 2000.0);

/// A service over a fresh conductor and an object store in a temporary
/// directory, removed on drop.
pub struct TestServer {
    pub service: ConductorService,
    pub clock: Arc<SimulatedClock>,
    pub runtime: tokio::runtime::Runtime,
    pub directory: TempDir,
}

impl TestServer {
    /// Create a server in fixed mode with UTC and [`INITIAL_BOUNDS`], a
    /// simulated clock at 2000, and a "met" time system.
    #[must_use]
    #[allow(clippy::expect_used, clippy::disallowed_methods)]
    pub fn new() -> Self {
        let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
        let directory = TempDir::new().expect("Failed to create temp dir");
        let store = runtime
            .block_on(FileObjectStore::open(directory.path()))
            .expect("Failed to open object store");

        let conductor =
            TimeConductor::new(TimeSystem::utc(), INITIAL_BOUNDS).expect("valid initial bounds");
        conductor.add_time_system(TimeSystem::relative(
            "met",
            "Mission Elapsed Time",
            TimeSystemDefaults {
                bounds: Some(TimeBounds::new(0.0, 86_400_000.0)),
                offsets: Some(ClockOffsets::new(60_000.0, 0.0)),
            },
        ));
        let clock = Arc::new(SimulatedClock::new(CLOCK, 2000.0));
        conductor.add_clock(clock.clone());

        Self {
            service: ConductorService::new(conductor, Arc::new(store)),
            clock,
            runtime,
            directory,
        }
    }

    /// Apply a query, panicking on rejection.
    #[allow(clippy::expect_used)]
    pub fn apply(&self, query: &str) -> crate::time::ConductorSnapshot {
        self.service
            .apply_query(query)
            .expect("query should be accepted")
    }
}
