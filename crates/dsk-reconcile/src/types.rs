use std::fmt;

use dsk_publisher::PublishError;
use dsk_source::SourceError;
use dsk_store::StoreError;

/// Why an iteration was aborted.
#[derive(Debug)]
pub enum IterationError {
    Source(SourceError),
    Publish(PublishError),
    Store(StoreError),
}

impl fmt::Display for IterationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationError::Source(e) => write!(f, "iteration aborted (source): {e}"),
            IterationError::Publish(e) => write!(f, "iteration aborted (publish): {e}"),
            IterationError::Store(e) => write!(f, "iteration aborted (store): {e}"),
        }
    }
}

impl std::error::Error for IterationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IterationError::Source(e) => Some(e),
            IterationError::Publish(e) => Some(e),
            IterationError::Store(e) => Some(e),
        }
    }
}

impl From<SourceError> for IterationError {
    fn from(e: SourceError) -> Self {
        IterationError::Source(e)
    }
}

impl From<PublishError> for IterationError {
    fn from(e: PublishError) -> Self {
        IterationError::Publish(e)
    }
}

impl From<StoreError> for IterationError {
    fn from(e: StoreError) -> Self {
        IterationError::Store(e)
    }
}

/// What a completed iteration did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Official ongoing disturbances in this iteration's feed snapshot.
    pub seen: usize,
    /// Disturbances that left the feed and were drained and forgotten.
    pub resolved: Vec<String>,
    /// Disturbances tracked for the first time.
    pub started: Vec<String>,
    pub posts_published: usize,
    /// Tracked disturbances after the iteration.
    pub tracked: usize,
}

impl IterationReport {
    pub fn is_quiet(&self) -> bool {
        self.posts_published == 0 && self.resolved.is_empty() && self.started.is_empty()
    }
}
