//! dsk-daemon library target.
//!
//! Exposes the router, shared state and loop runner for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod routes;
pub mod runner;
pub mod state;
