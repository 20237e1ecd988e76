//! dsk-publisher
//!
//! Post publisher boundary: everything that talks to the social network.
//!
//! - [`PostPublisher`]: create a post, upload an image blob.
//! - [`LinkPreviewer`]: fetch a page and extract its preview card fields.
//! - [`resolve_embed`]: turn an [`EmbedRequest`] into an [`ExternalEmbed`]
//!   (preview fetch + optional thumbnail upload).
//!
//! Concrete clients live in [`bsky`] (AT Protocol XRPC) and [`preview`]
//! (HTML scraping).

pub mod bsky;
pub mod preview;
mod session;

pub use bsky::BskyClient;
pub use preview::{parse_preview, HttpLinkPreviewer};

use std::fmt;

use dsk_schemas::{BlobRef, EmbedRequest, ExternalEmbed, OutgoingPost, StrongRef};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while building or publishing a post.
///
/// Link-preview failures are publish errors too: a post is never sent without
/// its embed.
#[derive(Debug)]
pub enum PublishError {
    /// Session creation failed (bad credentials, server refused).
    Auth(String),
    /// Network or transport failure.
    Transport(String),
    /// The server answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The embed thumbnail could not be downloaded.
    Image { url: String, message: String },
    /// The canonical page could not be fetched or parsed for a preview card.
    Preview { url: String, message: String },
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Auth(msg) => write!(f, "publisher auth error: {msg}"),
            PublishError::Transport(msg) => write!(f, "publisher transport error: {msg}"),
            PublishError::Api { status, message } => {
                write!(f, "publisher api error status={status}: {message}")
            }
            PublishError::Decode(msg) => write!(f, "publisher decode error: {msg}"),
            PublishError::Image { url, message } => {
                write!(f, "failed to fetch image {url}: {message}")
            }
            PublishError::Preview { url, message } => {
                write!(f, "failed to build link preview for {url}: {message}")
            }
        }
    }
}

impl std::error::Error for PublishError {}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Social-network publisher.
///
/// Implementations serialize their outbound calls; the engine never issues
/// two calls at once anyway.
#[async_trait::async_trait]
pub trait PostPublisher: Send + Sync {
    /// Create the post; returns its durable (uri, cid) reference.
    async fn publish(&self, post: &OutgoingPost) -> Result<StrongRef, PublishError>;

    /// Download `url` and upload it as a blob.
    async fn fetch_and_upload_image(&self, url: &str) -> Result<BlobRef, PublishError>;
}

/// Fields of an external link-preview card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPreview {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
}

#[async_trait::async_trait]
pub trait LinkPreviewer: Send + Sync {
    async fn fetch_preview(&self, url: &str) -> Result<LinkPreview, PublishError>;
}

// ---------------------------------------------------------------------------
// Embed resolution
// ---------------------------------------------------------------------------

/// Resolve an embed request into a full preview card, uploading the preview
/// image as the card's thumbnail when the page advertises one.
pub async fn resolve_embed(
    previewer: &dyn LinkPreviewer,
    publisher: &dyn PostPublisher,
    request: &EmbedRequest,
) -> Result<ExternalEmbed, PublishError> {
    let preview = previewer.fetch_preview(&request.uri).await?;

    let thumb = match preview.image_url.as_deref() {
        Some(image_url) => Some(publisher.fetch_and_upload_image(image_url).await?),
        None => None,
    };

    Ok(ExternalEmbed {
        uri: request.uri.clone(),
        title: preview.title,
        description: preview.description,
        thumb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsk_schemas::CidLink;
    use std::sync::Mutex;

    struct FixedPreview(LinkPreview);

    #[async_trait::async_trait]
    impl LinkPreviewer for FixedPreview {
        async fn fetch_preview(&self, _url: &str) -> Result<LinkPreview, PublishError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl PostPublisher for RecordingPublisher {
        async fn publish(&self, _post: &OutgoingPost) -> Result<StrongRef, PublishError> {
            unreachable!("resolve_embed never publishes")
        }

        async fn fetch_and_upload_image(&self, url: &str) -> Result<BlobRef, PublishError> {
            self.uploads.lock().unwrap().push(url.to_string());
            Ok(BlobRef {
                kind: "blob".to_string(),
                reference: CidLink {
                    link: "bafkthumb".to_string(),
                },
                mime_type: "image/png".to_string(),
                size: 10,
            })
        }
    }

    fn request() -> EmbedRequest {
        EmbedRequest {
            uri: "https://x.org/d/1".to_string(),
        }
    }

    #[tokio::test]
    async fn embed_without_image_skips_upload() {
        let previewer = FixedPreview(LinkPreview {
            title: "Perturbação".to_string(),
            description: "Linha Azul".to_string(),
            image_url: None,
        });
        let publisher = RecordingPublisher::default();

        let embed = resolve_embed(&previewer, &publisher, &request()).await.unwrap();
        assert_eq!(embed.uri, "https://x.org/d/1");
        assert_eq!(embed.title, "Perturbação");
        assert!(embed.thumb.is_none());
        assert!(publisher.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn embed_with_image_uploads_thumb() {
        let previewer = FixedPreview(LinkPreview {
            title: "t".to_string(),
            description: "d".to_string(),
            image_url: Some("https://x.org/og.png".to_string()),
        });
        let publisher = RecordingPublisher::default();

        let embed = resolve_embed(&previewer, &publisher, &request()).await.unwrap();
        assert_eq!(embed.thumb.unwrap().reference.link, "bafkthumb");
        assert_eq!(
            *publisher.uploads.lock().unwrap(),
            vec!["https://x.org/og.png".to_string()]
        );
    }
}
