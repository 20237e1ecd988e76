//! In-memory collaborators for engine scenarios.
//!
//! Every fake is shared through an `Arc` so the test keeps a handle to
//! inspect (or re-program) it while the engine owns another.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use dsk_content::{LinkTemplate, PostContentBuilder};
use dsk_publisher::{LinkPreview, LinkPreviewer, PostPublisher, PublishError};
use dsk_reconcile::{Collaborators, ReconcileEngine};
use dsk_schemas::{BlobRef, Checkpoint, Disturbance, OutgoingPost, Status, StrongRef};
use dsk_source::{DisturbanceSource, SourceError};
use dsk_store::{CheckpointStore, StoreError};

pub const LINK_TEMPLATE: &str = "https://perturbacoes.example/d/%s";

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Status whose description is its id, so posts can be traced back.
pub fn status(id: &str, official_source: bool) -> Status {
    Status {
        id: id.to_string(),
        time: Some(Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()),
        downtime: true,
        msg_type: "SLOW".to_string(),
        description: id.to_string(),
        official_source,
    }
}

pub fn official(id: &str) -> Status {
    status(id, true)
}

pub fn unofficial(id: &str) -> Status {
    status(id, false)
}

pub fn disturbance(id: &str, statuses: Vec<Status>) -> Disturbance {
    Disturbance {
        id: id.to_string(),
        line: Some("pt-ml-azul".to_string()),
        official: true,
        statuses,
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FeedState {
    ongoing: Vec<Disturbance>,
    records: HashMap<String, Disturbance>,
    fail_list: bool,
    fail_get: HashSet<String>,
    get_calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeSource {
    state: Mutex<FeedState>,
}

impl FakeSource {
    /// Replace the ongoing feed. Each entry is also served by id.
    pub fn set_ongoing(&self, ongoing: Vec<Disturbance>) {
        let mut st = self.state.lock().unwrap();
        for d in &ongoing {
            st.records.insert(d.id.clone(), d.clone());
        }
        st.ongoing = ongoing;
    }

    /// Serve a record by id only (e.g. a disturbance that left the feed).
    pub fn set_record(&self, d: Disturbance) {
        self.state.lock().unwrap().records.insert(d.id.clone(), d);
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn fail_get(&self, id: &str, fail: bool) {
        let mut st = self.state.lock().unwrap();
        if fail {
            st.fail_get.insert(id.to_string());
        } else {
            st.fail_get.remove(id);
        }
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().get_calls.clone()
    }
}

#[async_trait::async_trait]
impl DisturbanceSource for FakeSource {
    async fn list_ongoing_official(&self) -> Result<Vec<Disturbance>, SourceError> {
        let st = self.state.lock().unwrap();
        if st.fail_list {
            return Err(SourceError::Http {
                status: 503,
                what: "ongoing disturbances".to_string(),
            });
        }
        Ok(st.ongoing.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Disturbance, SourceError> {
        let mut st = self.state.lock().unwrap();
        st.get_calls.push(id.to_string());
        if st.fail_get.contains(id) {
            return Err(SourceError::Transport(format!("connection reset for {id}")));
        }
        st.records.get(id).cloned().ok_or_else(|| SourceError::Http {
            status: 404,
            what: format!("disturbance {id}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PublisherState {
    posts: Vec<OutgoingPost>,
    refs: Vec<StrongRef>,
    next_seq: u32,
    fail_at_post: Option<usize>,
}

#[derive(Default)]
pub struct FakePublisher {
    state: Mutex<PublisherState>,
}

impl FakePublisher {
    /// Sequence numbers (and so cids) start at `seq`; use distinct values
    /// across simulated restarts.
    pub fn starting_at(seq: u32) -> Self {
        let p = Self::default();
        p.state.lock().unwrap().next_seq = seq;
        p
    }

    /// Fail the `n`-th publish call (0-based, counting successful posts).
    pub fn fail_at_post(&self, n: Option<usize>) {
        self.state.lock().unwrap().fail_at_post = n;
    }

    pub fn posts(&self) -> Vec<OutgoingPost> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn refs(&self) -> Vec<StrongRef> {
        self.state.lock().unwrap().refs.clone()
    }

    /// Status ids of the published posts, in publish order.
    pub fn posted_status_ids(&self) -> Vec<String> {
        self.posts()
            .iter()
            .map(|p| p.text.rsplit(' ').next().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait::async_trait]
impl PostPublisher for FakePublisher {
    async fn publish(&self, post: &OutgoingPost) -> Result<StrongRef, PublishError> {
        let mut st = self.state.lock().unwrap();
        if st.fail_at_post == Some(st.posts.len()) {
            return Err(PublishError::Api {
                status: 503,
                message: "createRecord: upstream unavailable".to_string(),
            });
        }
        let seq = st.next_seq;
        st.next_seq += 1;
        let r = StrongRef {
            uri: format!("at://did:plc:bot/app.bsky.feed.post/{seq}"),
            cid: format!("cid-{seq}"),
        };
        st.posts.push(post.clone());
        st.refs.push(r.clone());
        Ok(r)
    }

    async fn fetch_and_upload_image(&self, _url: &str) -> Result<BlobRef, PublishError> {
        unreachable!("fake previewer never advertises an image")
    }
}

// ---------------------------------------------------------------------------
// Previewer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakePreviewer {
    fail: Mutex<bool>,
}

impl FakePreviewer {
    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl LinkPreviewer for FakePreviewer {
    async fn fetch_preview(&self, url: &str) -> Result<LinkPreview, PublishError> {
        if *self.fail.lock().unwrap() {
            return Err(PublishError::Preview {
                url: url.to_string(),
                message: "http status=502".to_string(),
            });
        }
        Ok(LinkPreview {
            title: "Perturbação".to_string(),
            description: "Linha Azul".to_string(),
            image_url: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    saved: Option<Checkpoint>,
    history: Vec<Checkpoint>,
    fail_at_save: Option<usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with_checkpoint(cp: Checkpoint) -> Self {
        let s = Self::default();
        s.state.lock().unwrap().saved = Some(cp);
        s
    }

    /// Fail the `n`-th save (0-based, counting successful saves).
    pub fn fail_at_save(&self, n: Option<usize>) {
        self.state.lock().unwrap().fail_at_save = n;
    }

    pub fn saved(&self) -> Checkpoint {
        self.state
            .lock()
            .unwrap()
            .saved
            .clone()
            .unwrap_or_default()
    }

    /// Every successfully saved checkpoint, oldest first.
    pub fn history(&self) -> Vec<Checkpoint> {
        self.state.lock().unwrap().history.clone()
    }
}

impl CheckpointStore for MemoryStore {
    fn load(&self) -> Result<Checkpoint, StoreError> {
        Ok(self.saved())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut st = self.state.lock().unwrap();
        if st.fail_at_save == Some(st.history.len()) {
            return Err(StoreError::Write {
                path: PathBuf::from("memory://checkpoint"),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        st.saved = Some(checkpoint.clone());
        st.history.push(checkpoint.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub publisher: Arc<FakePublisher>,
    pub previewer: Arc<FakePreviewer>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::default())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            source: Arc::new(FakeSource::default()),
            publisher: Arc::new(FakePublisher::default()),
            previewer: Arc::new(FakePreviewer::default()),
            store: Arc::new(store),
        }
    }

    /// Simulate a process restart: same feed and durable store, fresh
    /// publisher whose ids start at `seq`.
    pub fn restarted(&self, seq: u32) -> Self {
        Self {
            source: Arc::clone(&self.source),
            publisher: Arc::new(FakePublisher::starting_at(seq)),
            previewer: Arc::clone(&self.previewer),
            store: Arc::clone(&self.store),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            source: self.source.clone(),
            publisher: self.publisher.clone(),
            previewer: self.previewer.clone(),
            store: self.store.clone(),
        }
    }

    /// Engine loaded from the durable store, as at process start.
    pub fn engine(&self) -> ReconcileEngine {
        let content = PostContentBuilder::new(
            chrono_tz::UTC,
            vec!["pt-PT".to_string()],
            LinkTemplate::parse(LINK_TEMPLATE).unwrap(),
        );
        ReconcileEngine::load(self.collaborators(), content).unwrap()
    }
}
