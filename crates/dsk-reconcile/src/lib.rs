//! dsk-reconcile
//!
//! Reconciliation engine: one polling iteration diffs the live disturbance
//! feed against the checkpoint and posts every not-yet-posted official status
//! as a reply in its disturbance's thread.
//!
//! Exactly-once rules:
//! - The checkpoint is saved after every single post, before the next one.
//! - A disturbance entry is saved before its first post, and deleted only
//!   after it left the feed and its remaining statuses were drained.
//! - Any error aborts the iteration; what was saved stands.

mod engine;
mod types;

pub use engine::{Collaborators, ReconcileEngine};
pub use types::*;
