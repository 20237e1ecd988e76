//! dsk-schemas
//!
//! Shared data model for the disturbance mirror:
//! - feed-side records ([`Disturbance`], [`Status`]) as seen by the engine
//! - the persisted checkpoint ([`Checkpoint`], [`KnownDisturbance`], [`KnownStatus`])
//! - post-side records handed from the content builder to the publisher
//!
//! Plain data only. No IO.

mod checkpoint;
mod post;

pub use checkpoint::*;
pub use post::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped update within a disturbance's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    /// `None` when upstream omitted the timestamp.
    pub time: Option<DateTime<Utc>>,
    pub downtime: bool,
    /// Free-text message type tag (e.g. `"HALT_LINE"`, `"SLOW"`).
    pub msg_type: String,
    pub description: String,
    /// Only officially-sourced statuses are ever posted.
    pub official_source: bool,
}

/// A transit-line service event with an append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disturbance {
    pub id: String,
    pub line: Option<String>,
    pub official: bool,
    /// Upstream order. Upstream only ever appends.
    pub statuses: Vec<Status>,
}
