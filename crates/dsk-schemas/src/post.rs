use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable reference to a published post: (location, content id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

/// Threading reference of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: StrongRef,
    pub parent: StrongRef,
}

/// Severity of a status, rendered as a coloured marker in the post text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Service running.
    Normal,
    /// Downtime without a halt.
    Degraded,
    /// Line halted.
    Halted,
}

impl Severity {
    pub fn marker(&self) -> &'static str {
        match self {
            Severity::Normal => "🟢",
            Severity::Degraded => "🟠",
            Severity::Halted => "🔴",
        }
    }
}

/// Link annotation over a UTF-8 byte range of the post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFacet {
    pub byte_start: usize,
    pub byte_end: usize,
    pub uri: String,
}

/// Request for an external link-preview card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub uri: String,
}

/// `{"$link": "<cid>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidLink {
    #[serde(rename = "$link")]
    pub link: String,
}

/// An uploaded blob, as returned by the publisher's upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    #[serde(rename = "$type", default = "blob_type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: CidLink,
    pub mime_type: String,
    pub size: u64,
}

fn blob_type() -> String {
    "blob".to_string()
}

/// A resolved external link-preview card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEmbed {
    pub uri: String,
    pub title: String,
    pub description: String,
    pub thumb: Option<BlobRef>,
}

/// Everything the content builder decides about one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub text: String,
    pub langs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub severity: Severity,
    pub reply: Option<ReplyRef>,
    pub facets: Vec<LinkFacet>,
    pub embed: EmbedRequest,
}

/// A post ready for the publisher: the draft plus its resolved embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPost {
    pub text: String,
    pub langs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub severity: Severity,
    pub reply: Option<ReplyRef>,
    pub facets: Vec<LinkFacet>,
    pub embed: Option<ExternalEmbed>,
}

impl OutgoingPost {
    pub fn from_draft(draft: PostDraft, embed: Option<ExternalEmbed>) -> Self {
        Self {
            text: draft.text,
            langs: draft.langs,
            created_at: draft.created_at,
            severity: draft.severity,
            reply: draft.reply,
            facets: draft.facets,
            embed,
        }
    }
}
