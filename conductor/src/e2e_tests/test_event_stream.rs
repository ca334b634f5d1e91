//! Test the event stream seen by WebSocket clients.

use crate::e2e_tests::helpers::*;
use crate::service::ConductorService;
use crate::time::{ConductorEvent, TimeBounds};

#[test]
fn test_time_system_change_emits_bounds_after() {
    let server = TestServer::new();
    let mut events = server.service.subscribe();

    server.apply("tc.timeSystem=met&tc.startBound=0&tc.endBound=10");

    let events = drain_events(&mut events);
    assert_eq!(
        events,
        vec![
            ConductorEvent::TimeSystem {
                key: "met".to_string()
            },
            ConductorEvent::Bounds {
                bounds: TimeBounds::new(0.0, 10.0),
                tick: false
            },
        ]
    );
}

#[test]
fn test_ticks_are_flagged() {
    let server = TestServer::new();
    server.apply("tc.mode=sim&tc.startDelta=-10&tc.endDelta=0");
    let mut events = server.service.subscribe();

    server.clock.advance(5.0);

    assert_eq!(
        drain_events(&mut events),
        vec![ConductorEvent::Bounds {
            bounds: TimeBounds::new(1995.0, 2005.0),
            tick: true
        }]
    );
}

#[test]
fn test_events_encode_as_tagged_json() {
    let server = TestServer::new();
    let mut events = server.service.subscribe();

    server.apply("tc.mode=sim&tc.startDelta=-10&tc.endDelta=0");

    let frames: Vec<serde_json::Value> = drain_events(&mut events)
        .iter()
        .map(|event| {
            let text = ConductorService::encode_event(event).unwrap();
            serde_json::from_str(&text).unwrap()
        })
        .collect();
    let tags: Vec<&str> = frames
        .iter()
        .map(|frame| frame["event"].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["clock", "clockOffsets", "bounds"]);
    assert_eq!(frames[0]["key"], "sim");
    assert_eq!(frames[2]["bounds"]["start"], 1990.0);
}

#[test]
fn test_every_subscriber_sees_events() {
    let server = TestServer::new();
    let mut first = server.service.subscribe();
    let mut second = server.service.subscribe();

    server.apply("tc.startBound=1&tc.endBound=2");

    assert_eq!(drain_events(&mut first), drain_events(&mut second));
}
