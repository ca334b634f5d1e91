//! Test that the same sequence of operations produces identical results.

use crate::e2e_tests::helpers::*;
use crate::time::{ConductorEvent, ConductorSnapshot};

fn run_sequence() -> (Vec<ConductorSnapshot>, Vec<ConductorEvent>) {
    let server = TestServer::new();
    let mut events = server.service.subscribe();
    let mut snapshots = Vec::new();

    snapshots.push(server.apply("tc.startBound=0&tc.endBound=100"));
    snapshots.push(server.apply("tc.mode=sim&tc.startDelta=-50&tc.endDelta=10"));
    server.clock.advance(25.0);
    snapshots.push(server.service.snapshot());
    snapshots.push(server.apply("tc.startDelta=-75&tc.endDelta=0"));
    server.clock.advance(25.0);
    snapshots.push(server.apply("tc.mode=fixed"));
    snapshots.push(server.apply("tc.timeSystem=met&tc.startBound=0&tc.endBound=5"));

    (snapshots, drain_events(&mut events))
}

#[test]
fn test_deterministic_sequence() {
    let run1 = run_sequence();
    let run2 = run_sequence();

    assert_eq!(run1, run2);
    assert_eq!(run1.0.len(), 6);
}
