//! Shared test fixtures.

use futures::future::BoxFuture;

use crate::object::{DomainObject, Identifier, ObjectStore, PersistenceError};
use crate::time::{ConductorEvent, EventReceiver, TimeBounds, TimeConductor, TimeSystem};

/// A UTC conductor in fixed mode with bounds `{1000, 2000}`.
#[must_use]
#[allow(clippy::expect_used)]
pub fn new_test_conductor() -> TimeConductor {
    TimeConductor::new(TimeSystem::utc(), TimeBounds::new(1000.0, 2000.0))
        .expect("valid initial bounds")
}

/// Take every event currently queued on `events`.
pub fn drain_events(events: &mut EventReceiver) -> Vec<ConductorEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// A store that finds nothing and rejects every save.
pub struct ReadOnlyStore;

impl ObjectStore for ReadOnlyStore {
    fn get<'a>(
        &'a self,
        _identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<Option<DomainObject>, PersistenceError>> {
        Box::pin(async { Ok(None) })
    }

    fn save<'a>(
        &'a self,
        _object: &'a DomainObject,
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async { Err(PersistenceError::Rejected("read only".to_string())) })
    }

    fn delete<'a>(
        &'a self,
        _identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async { Ok(()) })
    }
}
