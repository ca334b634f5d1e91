//! Test following the simulated clock through URL parameters.

use crate::e2e_tests::helpers::*;
use crate::time::{ClockOffsets, Mode, TimeBounds};

#[test]
fn test_follow_derives_bounds_from_clock() {
    let server = TestServer::new();

    // Clock is at 2000; a 300ms window ending now.
    let snapshot = server.apply("tc.mode=sim&tc.startDelta=-300&tc.endDelta=0");

    assert_eq!(
        snapshot.mode,
        Mode::Follow {
            clock: CLOCK.to_string()
        }
    );
    assert_eq!(snapshot.clock_offsets, Some(ClockOffsets::new(300.0, 0.0)));
    assert_eq!(snapshot.bounds, TimeBounds::new(1700.0, 2000.0));
}

#[test]
fn test_follow_tracks_ticks() {
    let server = TestServer::new();
    server.apply("tc.mode=sim&tc.startDelta=-10&tc.endDelta=5");

    server.clock.advance(1000.0);
    assert_eq!(server.service.snapshot().bounds, TimeBounds::new(2990.0, 3005.0));

    server.clock.set(2500.0);
    assert_eq!(server.service.snapshot().bounds, TimeBounds::new(2490.0, 2505.0));
}

#[test]
fn test_offsets_change_rebases_on_now() {
    let server = TestServer::new();
    server.apply("tc.mode=sim&tc.startDelta=-10&tc.endDelta=5");
    // Bounds {1990, 2005}.

    let snapshot = server.apply("tc.startDelta=-20&tc.endDelta=0");

    assert_eq!(snapshot.bounds, TimeBounds::new(1980.0, 2000.0));
}

#[test]
fn test_back_to_fixed_freezes_bounds() {
    let server = TestServer::new();
    server.apply("tc.mode=sim&tc.startDelta=-100&tc.endDelta=0");
    server.clock.advance(50.0);

    let snapshot = server.apply("tc.mode=fixed");
    assert_eq!(snapshot.mode, Mode::Fixed);
    assert_eq!(snapshot.bounds, TimeBounds::new(1950.0, 2050.0));

    server.clock.advance(50.0);
    assert_eq!(server.service.snapshot().bounds, TimeBounds::new(1950.0, 2050.0));
    assert_eq!(server.clock.listener_count(), 0);
}

#[test]
fn test_follow_without_offsets_uses_time_system_defaults() {
    let server = TestServer::new();

    let snapshot = server.apply("tc.mode=sim");

    // UTC follows the last fifteen minutes by default.
    assert_eq!(snapshot.clock_offsets, Some(ClockOffsets::new(900_000.0, 0.0)));
    assert_eq!(snapshot.bounds, TimeBounds::new(2000.0 - 900_000.0, 2000.0));
}
