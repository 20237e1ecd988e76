use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ReplyRef, StrongRef};

/// A status that has actually been posted, with the post's durable reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownStatus {
    /// Upstream status id.
    pub id: String,
    pub post_cid: String,
    pub post_uri: String,
}

impl KnownStatus {
    pub fn new(id: impl Into<String>, post: &StrongRef) -> Self {
        Self {
            id: id.into(),
            post_cid: post.cid.clone(),
            post_uri: post.uri.clone(),
        }
    }

    pub fn post_ref(&self) -> StrongRef {
        StrongRef {
            uri: self.post_uri.clone(),
            cid: self.post_cid.clone(),
        }
    }
}

/// A tracked disturbance and the chain of statuses posted for it so far.
///
/// `known_statuses` is append-only and in posting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownDisturbance {
    pub id: String,
    #[serde(default)]
    pub known_statuses: Vec<KnownStatus>,
}

impl KnownDisturbance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            known_statuses: Vec::new(),
        }
    }
}

/// Reply reference for the next post of a chain.
///
/// `None` for an empty chain; otherwise root is the first posted status and
/// parent the last one.
pub fn reply_ref_for(chain: &[KnownStatus]) -> Option<ReplyRef> {
    let first = chain.first()?;
    let last = chain.last()?;
    Some(ReplyRef {
        root: first.post_ref(),
        parent: last.post_ref(),
    })
}

/// The full persisted model: disturbance id -> tracked disturbance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub known_disturbances: BTreeMap<String, KnownDisturbance>,
}

impl Checkpoint {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_tracked(&self, disturbance_id: &str) -> bool {
        self.known_disturbances.contains_key(disturbance_id)
    }

    /// Snapshot of the tracked ids, in stable order.
    pub fn tracked_ids(&self) -> Vec<String> {
        self.known_disturbances.keys().cloned().collect()
    }

    /// Posted chain for a disturbance (empty if untracked).
    pub fn chain(&self, disturbance_id: &str) -> &[KnownStatus] {
        self.known_disturbances
            .get(disturbance_id)
            .map(|d| d.known_statuses.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.known_disturbances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_disturbances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(id: &str, n: u32) -> KnownStatus {
        KnownStatus {
            id: id.to_string(),
            post_cid: format!("cid-{n}"),
            post_uri: format!("at://did:plc:bot/app.bsky.feed.post/{n}"),
        }
    }

    #[test]
    fn empty_chain_has_no_reply_ref() {
        assert!(reply_ref_for(&[]).is_none());
    }

    #[test]
    fn single_post_chain_is_both_root_and_parent() {
        let chain = vec![known("s1", 1)];
        let r = reply_ref_for(&chain).unwrap();
        assert_eq!(r.root, r.parent);
        assert_eq!(r.root.cid, "cid-1");
    }

    #[test]
    fn longer_chain_roots_at_first_and_parents_at_last() {
        let chain = vec![known("s1", 1), known("s2", 2), known("s3", 3)];
        let r = reply_ref_for(&chain).unwrap();
        assert_eq!(r.root.cid, "cid-1");
        assert_eq!(r.parent.cid, "cid-3");
        assert_eq!(r.parent.uri, "at://did:plc:bot/app.bsky.feed.post/3");
    }

    #[test]
    fn checkpoint_json_keeps_chain_order() {
        let mut cp = Checkpoint::empty();
        let mut d = KnownDisturbance::new("d1");
        d.known_statuses = vec![known("s2", 2), known("s1", 1)];
        cp.known_disturbances.insert("d1".to_string(), d);

        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
        assert_eq!(back.chain("d1")[0].id, "s2");
        assert!(back.chain("missing").is_empty());
    }
}
