//! dsk-source
//!
//! Disturbance source boundary: the read-only feed of ongoing disturbances.
//!
//! This crate owns the [`DisturbanceSource`] trait and the HTTP client for the
//! disturbances REST API. It does **not** decide what gets posted; the
//! reconcile engine does.

use std::fmt;

use chrono::{DateTime, Utc};
use dsk_schemas::{Disturbance, Status};
use serde::Deserialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`DisturbanceSource`] may return.
#[derive(Debug)]
pub enum SourceError {
    /// Network or transport failure.
    Transport(String),
    /// The feed answered with a non-success status.
    Http { status: u16, what: String },
    /// The response body could not be decoded.
    Decode(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "source transport error: {msg}"),
            SourceError::Http { status, what } => {
                write!(f, "failed to fetch {what}: http status={status}")
            }
            SourceError::Decode(msg) => write!(f, "source decode error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Read-only disturbance feed.
///
/// Object-safe so the engine can hold an `Arc<dyn DisturbanceSource>`.
#[async_trait::async_trait]
pub trait DisturbanceSource: Send + Sync {
    /// Ongoing disturbances flagged official. Status lists may be partial.
    async fn list_ongoing_official(&self) -> Result<Vec<Disturbance>, SourceError>;

    /// One disturbance by id, with its full status history.
    async fn get_by_id(&self, id: &str) -> Result<Disturbance, SourceError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Client for the disturbances REST API (`/disturbances`, `/disturbances/{id}`).
#[derive(Debug, Clone)]
pub struct HttpDisturbanceSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDisturbanceSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::new_with_client(reqwest::Client::new(), base_url)
    }

    pub fn new_with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn disturbances_url(&self) -> String {
        format!("{}/disturbances", self.base_url.trim_end_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
        what: String,
    ) -> Result<T, SourceError> {
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Transport(format!("{what}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                what,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| SourceError::Decode(format!("{what}: {e}")))
    }
}

#[async_trait::async_trait]
impl DisturbanceSource for HttpDisturbanceSource {
    async fn list_ongoing_official(&self) -> Result<Vec<Disturbance>, SourceError> {
        let wire: Vec<WireDisturbance> = self
            .get_json(
                self.disturbances_url(),
                &[("filter", "ongoing"), ("omitduplicatestatus", "true")],
                "ongoing disturbances".to_string(),
            )
            .await?;

        let total = wire.len();
        let official: Vec<Disturbance> = wire
            .into_iter()
            .map(WireDisturbance::into_disturbance)
            .filter(|d| d.official)
            .collect();
        debug!(total, official = official.len(), "listed ongoing disturbances");
        Ok(official)
    }

    async fn get_by_id(&self, id: &str) -> Result<Disturbance, SourceError> {
        let wire: WireDisturbance = self
            .get_json(
                format!("{}/{}", self.disturbances_url(), id),
                &[("omitduplicatestatus", "true")],
                format!("disturbance {id}"),
            )
            .await?;
        Ok(wire.into_disturbance())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDisturbance {
    id: String,
    official: Option<bool>,
    line: Option<String>,
    statuses: Option<Vec<WireStatus>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatus {
    id: String,
    time: Option<DateTime<Utc>>,
    downtime: Option<bool>,
    msg_type: Option<String>,
    /// Free-text description.
    status: Option<String>,
    official_source: Option<bool>,
}

impl WireDisturbance {
    fn into_disturbance(self) -> Disturbance {
        Disturbance {
            id: self.id,
            line: self.line.filter(|l| !l.is_empty()),
            official: self.official.unwrap_or(false),
            statuses: self
                .statuses
                .unwrap_or_default()
                .into_iter()
                .map(WireStatus::into_status)
                .collect(),
        }
    }
}

impl WireStatus {
    fn into_status(self) -> Status {
        Status {
            id: self.id,
            time: self.time,
            downtime: self.downtime.unwrap_or(false),
            msg_type: self.msg_type.unwrap_or_default(),
            description: self.status.unwrap_or_default(),
            official_source: self.official_source.unwrap_or(false),
        }
    }
}
