//! End-to-end tests at the service level.
//!
//! Each test file covers a specific scenario, driving a `ConductorService`
//! the way the HTTP and WebSocket handlers do, with a simulated clock and a
//! file-backed object store in a temporary directory.

#![cfg(test)]

mod helpers;

mod test_determinism;
mod test_event_stream;
mod test_fixed_mode;
mod test_follow_mode;
mod test_invalid_input;
mod test_objects;
mod test_url_round_trip;
