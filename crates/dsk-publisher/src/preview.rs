//! Link-preview card fetcher: title, meta description and `og:image` of the
//! canonical disturbance page.

use scraper::{Html, Selector};

use crate::{LinkPreview, LinkPreviewer, PublishError};

#[derive(Debug, Clone, Default)]
pub struct HttpLinkPreviewer {
    http: reqwest::Client,
}

impl HttpLinkPreviewer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LinkPreviewer for HttpLinkPreviewer {
    async fn fetch_preview(&self, url: &str) -> Result<LinkPreview, PublishError> {
        let preview_err = |message: String| PublishError::Preview {
            url: url.to_string(),
            message,
        };

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| preview_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(preview_err(format!("http status={}", status.as_u16())));
        }

        let html = resp.text().await.map_err(|e| preview_err(e.to_string()))?;
        parse_preview(&html).map_err(preview_err)
    }
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector {css}: {e}"))
}

/// Extract the preview card fields from an HTML document.
///
/// Missing elements yield empty strings / no image; only the first match of
/// each selector is used.
pub fn parse_preview(html: &str) -> Result<LinkPreview, String> {
    let doc = Html::parse_document(html);

    let title_sel = selector("title")?;
    let description_sel = selector(r#"meta[name="description"]"#)?;
    let image_sel = selector(r#"meta[property="og:image"]"#)?;

    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let description = doc
        .select(&description_sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string();

    let image_url = doc
        .select(&image_sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(LinkPreview {
        title,
        description,
        image_url,
    })
}
