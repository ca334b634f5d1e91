//! Test that invalid URL parameters are rejected without changing state.

use crate::e2e_tests::helpers::*;
use crate::service::ServiceError;
use crate::time::{ConductorError, Mode, TimeBounds};
use crate::url_state::UrlStateError;

fn assert_rejected(query: &str) -> ServiceError {
    let server = TestServer::new();
    let before = server.service.snapshot();
    let mut events = server.service.subscribe();

    let error = server.service.apply_query(query).unwrap_err();

    assert!(error.is_client_error(), "{query}: {error}");
    assert_eq!(server.service.snapshot(), before, "{query}");
    assert!(drain_events(&mut events).is_empty(), "{query}");
    error
}

#[test]
fn test_reversed_bounds() {
    let error = assert_rejected("tc.startBound=2000&tc.endBound=1000");
    assert!(matches!(
        error,
        ServiceError::Url(UrlStateError::Conductor(ConductorError::InvalidBounds(_)))
    ));
}

#[test]
fn test_non_numeric_bound() {
    let error = assert_rejected("tc.startBound=yesterday&tc.endBound=1000");
    assert!(matches!(error, ServiceError::Url(UrlStateError::Malformed(_))));
}

#[test]
fn test_half_a_bounds_pair() {
    let error = assert_rejected("tc.startBound=1000");
    assert!(matches!(error, ServiceError::Url(UrlStateError::IncompleteBounds)));
}

#[test]
fn test_half_an_offsets_pair() {
    let error = assert_rejected("tc.endDelta=0");
    assert!(matches!(error, ServiceError::Url(UrlStateError::IncompleteOffsets)));
}

#[test]
fn test_negative_offset() {
    // A positive startDelta decodes to a negative start offset.
    let error = assert_rejected("tc.mode=sim&tc.startDelta=100&tc.endDelta=0");
    assert!(matches!(
        error,
        ServiceError::Url(UrlStateError::Conductor(ConductorError::InvalidOffsets(_)))
    ));
}

#[test]
fn test_unknown_clock() {
    let error = assert_rejected("tc.mode=sundial");
    assert!(matches!(
        error,
        ServiceError::Url(UrlStateError::Conductor(ConductorError::UnknownClock(_)))
    ));
}

#[test]
fn test_unknown_time_system() {
    let error = assert_rejected("tc.timeSystem=tai&tc.startBound=0&tc.endBound=1");
    assert!(matches!(
        error,
        ServiceError::Url(UrlStateError::Conductor(ConductorError::UnknownTimeSystem(_)))
    ));
}

#[test]
fn test_rejection_while_following_keeps_following() {
    let server = TestServer::new();
    server.apply("tc.mode=sim&tc.startDelta=-10&tc.endDelta=0");

    assert!(server.service.apply_query("tc.startDelta=-5").is_err());

    let snapshot = server.service.snapshot();
    assert_eq!(
        snapshot.mode,
        Mode::Follow {
            clock: CLOCK.to_string()
        }
    );
    server.clock.advance(10.0);
    assert_eq!(server.service.snapshot().bounds, TimeBounds::new(2000.0, 2010.0));
}
