//! Publisher session, owned by the client's single-flight lock.

use std::time::{Duration, Instant};

/// Sessions older than this are re-created before the next call.
pub(crate) const SESSION_FRESHNESS: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub(crate) struct Session {
    pub(crate) access_jwt: String,
    pub(crate) did: String,
    pub(crate) handle: String,
    established_at: Instant,
}

impl Session {
    pub(crate) fn new(access_jwt: String, did: String, handle: String) -> Self {
        Self {
            access_jwt,
            did,
            handle,
            established_at: Instant::now(),
        }
    }

    pub(crate) fn is_fresh(&self, window: Duration) -> bool {
        self.established_at.elapsed() < window
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_jwt", &"<REDACTED>")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("age", &self.established_at.elapsed())
            .finish()
    }
}
