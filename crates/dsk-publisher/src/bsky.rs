//! AT Protocol (Bluesky) XRPC publisher.
//!
//! # Single-flight
//! Every outbound call (session creation, post, blob upload) runs while
//! holding one `tokio::sync::Mutex`, which also owns the [`Session`]. A
//! session refresh can therefore never race an in-flight call, and calls are
//! issued in exactly the order the caller awaits them.
//!
//! # Session lifetime
//! The session is re-created with the handle and app password when it is
//! older than [`SESSION_FRESHNESS`]. A failed refresh fails the call.

use std::time::Duration;

use chrono::SecondsFormat;
use dsk_schemas::{BlobRef, ExternalEmbed, LinkFacet, OutgoingPost, ReplyRef, StrongRef};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::session::{Session, SESSION_FRESHNESS};
use crate::{PostPublisher, PublishError};

const POST_COLLECTION: &str = "app.bsky.feed.post";
const LINK_FEATURE_TYPE: &str = "app.bsky.richtext.facet#link";
const EXTERNAL_EMBED_TYPE: &str = "app.bsky.embed.external";

pub struct BskyClient {
    http: reqwest::Client,
    host: String,
    handle: String,
    app_password: String,
    freshness: Duration,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for BskyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BskyClient")
            .field("host", &self.host)
            .field("handle", &self.handle)
            .field("app_password", &"<REDACTED>")
            .field("freshness", &self.freshness)
            .finish()
    }
}

impl BskyClient {
    pub fn new(host: impl Into<String>, handle: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into(),
            handle: handle.into(),
            app_password: app_password.into(),
            freshness: SESSION_FRESHNESS,
            session: Mutex::new(None),
        }
    }

    /// Override the session freshness window (tests use `Duration::ZERO` to
    /// force a refresh before every call).
    pub fn with_session_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Establish a session now. Used at startup to fail fast on bad
    /// credentials.
    pub async fn connect(&self) -> Result<(), PublishError> {
        let mut slot = self.session.lock().await;
        *slot = Some(self.create_session().await?);
        Ok(())
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.host.trim_end_matches('/'), method)
    }

    async fn create_session(&self) -> Result<Session, PublishError> {
        let resp = self
            .http
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&CreateSessionInput {
                identifier: &self.handle,
                password: &self.app_password,
            })
            .send()
            .await
            .map_err(|e| PublishError::Auth(format!("createSession: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Auth(format!(
                "createSession status={} {}",
                status.as_u16(),
                xrpc_error_message(&body)
            )));
        }

        let out: CreateSessionOutput = resp
            .json()
            .await
            .map_err(|e| PublishError::Decode(format!("createSession: {e}")))?;
        debug!(handle = %out.handle, did = %out.did, "publisher session established");
        Ok(Session::new(out.access_jwt, out.did, out.handle))
    }

    /// Current session, re-created first if missing or stale. Caller holds
    /// the lock for the whole call.
    async fn session_for_call(&self, slot: &mut Option<Session>) -> Result<Session, PublishError> {
        match slot.as_ref() {
            Some(s) if s.is_fresh(self.freshness) => Ok(s.clone()),
            _ => {
                let fresh = self.create_session().await?;
                *slot = Some(fresh.clone());
                Ok(fresh)
            }
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<(Vec<u8>, String), PublishError> {
        let image_err = |message: String| PublishError::Image {
            url: url.to_string(),
            message,
        };

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| image_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(image_err(format!("http status={}", status.as_u16())));
        }

        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| image_err(e.to_string()))?;
        Ok((bytes.to_vec(), mime))
    }
}

#[async_trait::async_trait]
impl PostPublisher for BskyClient {
    async fn publish(&self, post: &OutgoingPost) -> Result<StrongRef, PublishError> {
        let mut slot = self.session.lock().await;
        let session = self.session_for_call(&mut slot).await?;

        let input = CreateRecordInput {
            repo: &session.did,
            collection: POST_COLLECTION,
            record: FeedPostRecord::from_post(post),
        };

        let resp = self
            .http
            .post(self.xrpc_url("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&input)
            .send()
            .await
            .map_err(|e| PublishError::Transport(format!("createRecord: {e}")))?;

        let out: CreateRecordOutput = decode_xrpc(resp, "createRecord").await?;
        info!(uri = %out.uri, severity = ?post.severity, "created post");
        Ok(StrongRef {
            uri: out.uri,
            cid: out.cid,
        })
    }

    async fn fetch_and_upload_image(&self, url: &str) -> Result<BlobRef, PublishError> {
        let mut slot = self.session.lock().await;
        let session = self.session_for_call(&mut slot).await?;

        let (bytes, mime) = self.fetch_image(url).await?;

        let resp = self
            .http
            .post(self.xrpc_url("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await
            .map_err(|e| PublishError::Transport(format!("uploadBlob: {e}")))?;

        let out: UploadBlobOutput = decode_xrpc(resp, "uploadBlob").await?;
        debug!(url, cid = %out.blob.reference.link, "uploaded image blob");
        Ok(out.blob)
    }
}

async fn decode_xrpc<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    method: &str,
) -> Result<T, PublishError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PublishError::Api {
            status: status.as_u16(),
            message: format!("{method}: {}", xrpc_error_message(&body)),
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| PublishError::Decode(format!("{method}: {e}")))
}

/// XRPC errors are `{"error": "...", "message": "..."}`; fall back to the raw body.
fn xrpc_error_message(body: &str) -> String {
    match serde_json::from_str::<XrpcError>(body) {
        Ok(XrpcError {
            error: Some(e),
            message: Some(m),
        }) => format!("{e}: {m}"),
        Ok(XrpcError {
            error: Some(e),
            message: None,
        }) => e,
        _ => body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateSessionInput<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionOutput {
    access_jwt: String,
    handle: String,
    did: String,
}

#[derive(Deserialize)]
struct XrpcError {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct CreateRecordInput<'a> {
    repo: &'a str,
    collection: &'static str,
    record: FeedPostRecord<'a>,
}

#[derive(Deserialize)]
struct CreateRecordOutput {
    uri: String,
    cid: String,
}

#[derive(Deserialize)]
struct UploadBlobOutput {
    blob: BlobRef,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedPostRecord<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    text: &'a str,
    created_at: String,
    langs: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<&'a ReplyRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    facets: Vec<WireFacet<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embed: Option<WireEmbed<'a>>,
}

impl<'a> FeedPostRecord<'a> {
    pub(crate) fn from_post(post: &'a OutgoingPost) -> Self {
        Self {
            kind: POST_COLLECTION,
            text: &post.text,
            created_at: post.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            langs: &post.langs,
            reply: post.reply.as_ref(),
            facets: post.facets.iter().map(WireFacet::from_facet).collect(),
            embed: post.embed.as_ref().map(WireEmbed::from_external),
        }
    }
}

#[derive(Serialize)]
struct WireFacet<'a> {
    index: ByteSlice,
    features: Vec<LinkFeature<'a>>,
}

impl<'a> WireFacet<'a> {
    fn from_facet(f: &'a LinkFacet) -> Self {
        Self {
            index: ByteSlice {
                byte_start: f.byte_start,
                byte_end: f.byte_end,
            },
            features: vec![LinkFeature {
                kind: LINK_FEATURE_TYPE,
                uri: &f.uri,
            }],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ByteSlice {
    byte_start: usize,
    byte_end: usize,
}

#[derive(Serialize)]
struct LinkFeature<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    uri: &'a str,
}

#[derive(Serialize)]
struct WireEmbed<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    external: WireExternal<'a>,
}

impl<'a> WireEmbed<'a> {
    fn from_external(e: &'a ExternalEmbed) -> Self {
        Self {
            kind: EXTERNAL_EMBED_TYPE,
            external: WireExternal {
                uri: &e.uri,
                title: &e.title,
                description: &e.description,
                thumb: e.thumb.as_ref(),
            },
        }
    }
}

#[derive(Serialize)]
struct WireExternal<'a> {
    uri: &'a str,
    title: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumb: Option<&'a BlobRef>,
}
