// Life of a request:
// 1. An HTTP request or WebSocket frame comes in
// 2. URL parameters are decoded into time state
// 3. For time changes:
//     - Validate bounds and offsets
//     - Apply mode, time system, then bounds or offsets
//     - Broadcast change events to subscribers
//    For object edits:
//     - Wrap the object in the editable cache
//     - Mutate inside a transaction
//     - On outermost commit, flush dirty objects to the store
//
// System components:
//  - Time conductor with clocks
//  - Editable-object cache and transaction stack
//  - Object store

pub mod config;
pub mod edit;
pub mod object;
pub mod service;
pub mod simulation;
pub mod time;
pub mod url_state;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod testing;

pub use service::{ConductorService, ServiceError};
pub use time::TimeConductor;
