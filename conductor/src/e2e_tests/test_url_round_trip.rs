//! Test that URL state captured from one server reproduces it on another.

use crate::e2e_tests::helpers::*;

#[test]
fn test_fixed_state_round_trip() {
    let source = TestServer::new();
    source.apply("tc.mode=fixed&tc.timeSystem=met&tc.startBound=100&tc.endBound=200");
    let query = source.service.url_query().unwrap();

    let target = TestServer::new();
    target.apply(&query);

    assert_eq!(target.service.snapshot(), source.service.snapshot());
}

#[test]
fn test_follow_state_round_trip() {
    let source = TestServer::new();
    source.apply("tc.mode=sim&tc.startDelta=-60000&tc.endDelta=1000");
    let query = source.service.url_query().unwrap();
    assert!(query.contains("tc.mode=sim"));
    assert!(query.contains("tc.startDelta=-60000"));
    assert!(!query.contains("tc.startBound"));

    let target = TestServer::new();
    target.apply(&query);

    assert_eq!(target.service.snapshot(), source.service.snapshot());
}

#[test]
fn test_leading_question_mark_accepted() {
    let server = TestServer::new();
    let query = format!("?{}", server.service.url_query().unwrap());

    let other = TestServer::new();
    other.apply("tc.startBound=0&tc.endBound=1");
    other.apply(&query);

    assert_eq!(other.service.snapshot(), server.service.snapshot());
}
