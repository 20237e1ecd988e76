use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use dsk_content::PostContentBuilder;
use dsk_publisher::{resolve_embed, LinkPreviewer, PostPublisher, PublishError};
use dsk_schemas::{Checkpoint, Disturbance, KnownDisturbance, KnownStatus, OutgoingPost, Status};
use dsk_source::DisturbanceSource;
use dsk_store::{CheckpointStore, StoreError};
use tracing::{debug, info};

use crate::{IterationError, IterationReport};

/// External collaborators the engine drives.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn DisturbanceSource>,
    pub publisher: Arc<dyn PostPublisher>,
    pub previewer: Arc<dyn LinkPreviewer>,
    pub store: Arc<dyn CheckpointStore>,
}

/// Owns the in-memory checkpoint between its load and every save.
pub struct ReconcileEngine {
    collab: Collaborators,
    content: PostContentBuilder,
    checkpoint: Checkpoint,
}

impl ReconcileEngine {
    pub fn new(collab: Collaborators, content: PostContentBuilder, checkpoint: Checkpoint) -> Self {
        Self {
            collab,
            content,
            checkpoint,
        }
    }

    /// Build an engine from the persisted checkpoint.
    pub fn load(collab: Collaborators, content: PostContentBuilder) -> Result<Self, StoreError> {
        let checkpoint = collab.store.load()?;
        info!(tracked = checkpoint.len(), "checkpoint loaded");
        Ok(Self::new(collab, content, checkpoint))
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// One reconciliation pass over the live feed.
    ///
    /// Phases run in order over one snapshot of the feed: disappeared
    /// disturbances, already-tracked ones, then new ones.
    pub async fn run_iteration(&mut self) -> Result<IterationReport, IterationError> {
        let ongoing: Vec<Disturbance> = self
            .collab
            .source
            .list_ongoing_official()
            .await?
            .into_iter()
            .filter(|d| d.official)
            .collect();
        let seen: BTreeSet<String> = ongoing.iter().map(|d| d.id.clone()).collect();

        let mut report = IterationReport {
            seen: seen.len(),
            ..IterationReport::default()
        };

        // 1) Disappeared: fetch full history, drain, forget.
        for id in self.checkpoint.tracked_ids() {
            if seen.contains(&id) {
                continue;
            }
            let disturbance = self.collab.source.get_by_id(&id).await?;
            self.drain(&id, &disturbance, &mut report).await?;

            self.checkpoint.known_disturbances.remove(&id);
            self.collab.store.save(&self.checkpoint)?;
            info!(disturbance = %id, "disturbance resolved, no longer tracked");
            report.resolved.push(id);
        }

        // 2) Still ongoing and already tracked.
        let tracked: Vec<&Disturbance> = ongoing
            .iter()
            .filter(|d| self.checkpoint.is_tracked(&d.id))
            .collect();
        for disturbance in tracked {
            self.drain(&disturbance.id, disturbance, &mut report).await?;
        }

        // 3) New. Tracked (and saved) before the first post.
        let new: Vec<&Disturbance> = ongoing
            .iter()
            .filter(|d| !self.checkpoint.is_tracked(&d.id))
            .collect();
        for disturbance in new {
            // A feed listing the same id twice: the repeat drains onto the
            // chain started by the first entry.
            if !self.checkpoint.is_tracked(&disturbance.id) {
                self.checkpoint
                    .known_disturbances
                    .insert(disturbance.id.clone(), KnownDisturbance::new(&disturbance.id));
                self.collab.store.save(&self.checkpoint)?;
                info!(disturbance = %disturbance.id, line = ?disturbance.line, "tracking new disturbance");
                report.started.push(disturbance.id.clone());
            }

            self.drain(&disturbance.id, disturbance, &mut report).await?;
        }

        report.tracked = self.checkpoint.len();
        Ok(report)
    }

    /// Post every official status of `disturbance` not yet in its chain.
    ///
    /// Candidates start at index `len(chain)` of the upstream list: the count
    /// of posted statuses, not of statuses examined. Skipped non-official
    /// statuses are therefore looked at again on every pass, and a candidate
    /// already in the chain is skipped by id.
    async fn drain(
        &mut self,
        id: &str,
        disturbance: &Disturbance,
        report: &mut IterationReport,
    ) -> Result<(), IterationError> {
        let statuses = &disturbance.statuses;
        let start = statuses.len().min(self.checkpoint.chain(id).len());

        for status in &statuses[start..] {
            if !status.official_source {
                debug!(disturbance = %id, status = %status.id, "skipping non-official status");
                continue;
            }
            if self.checkpoint.chain(id).iter().any(|k| k.id == status.id) {
                continue;
            }

            let known = self.post_status(id, disturbance, status).await?;
            self.append_and_save(id, known)?;
            report.posts_published += 1;
        }
        Ok(())
    }

    async fn post_status(
        &self,
        id: &str,
        disturbance: &Disturbance,
        status: &Status,
    ) -> Result<KnownStatus, PublishError> {
        let draft = self
            .content
            .build(disturbance, self.checkpoint.chain(id), status, Utc::now());
        let embed = resolve_embed(
            self.collab.previewer.as_ref(),
            self.collab.publisher.as_ref(),
            &draft.embed,
        )
        .await?;

        let post = OutgoingPost::from_draft(draft, Some(embed));
        let published = self.collab.publisher.publish(&post).await?;
        info!(
            disturbance = %id,
            status = %status.id,
            uri = %published.uri,
            "posted status"
        );
        Ok(KnownStatus::new(&status.id, &published))
    }

    /// Append to the in-memory chain and persist, with no await in between.
    fn append_and_save(&mut self, id: &str, known: KnownStatus) -> Result<(), StoreError> {
        self.checkpoint
            .known_disturbances
            .entry(id.to_string())
            .or_insert_with(|| KnownDisturbance::new(id))
            .known_statuses
            .push(known);
        self.collab.store.save(&self.checkpoint)
    }
}
