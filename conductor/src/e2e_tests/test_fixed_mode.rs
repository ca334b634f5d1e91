//! Test fixed-mode bounds through URL parameters.

use crate::e2e_tests::helpers::*;
use crate::time::{Mode, TimeBounds};

#[test]
fn test_fixed_bounds_applied() {
    let server = TestServer::new();

    let snapshot = server.apply("tc.mode=fixed&tc.startBound=5000&tc.endBound=9000");

    assert_eq!(snapshot.mode, Mode::Fixed);
    assert_eq!(snapshot.bounds, TimeBounds::new(5000.0, 9000.0));
    assert_eq!(server.service.snapshot(), snapshot);
}

#[test]
fn test_fixed_bounds_ignore_clock_ticks() {
    let server = TestServer::new();
    server.apply("tc.mode=fixed&tc.startBound=5000&tc.endBound=9000");

    server.clock.advance(1_000_000.0);

    assert_eq!(server.service.snapshot().bounds, TimeBounds::new(5000.0, 9000.0));
}

#[test]
fn test_zero_width_bounds_accepted() {
    let server = TestServer::new();

    let snapshot = server.apply("tc.startBound=3000&tc.endBound=3000");

    assert_eq!(snapshot.bounds, TimeBounds::new(3000.0, 3000.0));
}

#[test]
fn test_time_system_switch_with_bounds() {
    let server = TestServer::new();

    let snapshot =
        server.apply("tc.mode=fixed&tc.timeSystem=met&tc.startBound=0&tc.endBound=60000");

    assert_eq!(snapshot.time_system, "met");
    assert_eq!(snapshot.bounds, TimeBounds::new(0.0, 60_000.0));
}

#[test]
fn test_unrelated_parameters_ignored() {
    let server = TestServer::new();

    let snapshot = server.apply("view=plot&tc.startBound=10&tc.endBound=20&zoom=2");

    assert_eq!(snapshot.bounds, TimeBounds::new(10.0, 20.0));
}
