//! dsk-content
//!
//! Post content builder: turns one status update of a disturbance into a
//! [`PostDraft`] (text, languages, reply threading, link facets and embed
//! request).
//!
//! Pure and deterministic given its inputs. No IO.

pub mod text;

use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dsk_schemas::{
    reply_ref_for, Disturbance, EmbedRequest, KnownStatus, LinkFacet, PostDraft, Severity, Status,
};

use crate::text::{fit_to_limit, title_case};

/// Line labels arrive as e.g. `"pt-ml-azul"`; only the colour is shown.
pub const LINE_CODE_PREFIX: &str = "pt-ml-";

const TEMPLATE_PLACEHOLDER: &str = "%s";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// The canonical link template must contain exactly one `%s`.
    BadLinkTemplate { template: String, placeholders: usize },
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::BadLinkTemplate {
                template,
                placeholders,
            } => write!(
                f,
                "link template '{template}' must contain exactly one '%s' (found {placeholders})"
            ),
        }
    }
}

impl std::error::Error for ContentError {}

// ---------------------------------------------------------------------------
// Link template
// ---------------------------------------------------------------------------

/// URL template for a disturbance's canonical page, e.g.
/// `"https://example.org/disturbances/%s"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate(String);

impl LinkTemplate {
    pub fn parse(template: &str) -> Result<Self, ContentError> {
        let placeholders = template.matches(TEMPLATE_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(ContentError::BadLinkTemplate {
                template: template.to_string(),
                placeholders,
            });
        }
        Ok(Self(template.to_string()))
    }

    pub fn render(&self, disturbance_id: &str) -> String {
        self.0.replacen(TEMPLATE_PLACEHOLDER, disturbance_id, 1)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Severity of a status: green unless downtime, red if the message type
/// mentions a halt, orange otherwise.
pub fn severity_of(status: &Status) -> Severity {
    if !status.downtime {
        Severity::Normal
    } else if status.msg_type.contains("HALT") {
        Severity::Halted
    } else {
        Severity::Degraded
    }
}

#[derive(Debug, Clone)]
pub struct PostContentBuilder {
    timezone: Tz,
    langs: Vec<String>,
    link_template: LinkTemplate,
}

impl PostContentBuilder {
    pub fn new(timezone: Tz, langs: Vec<String>, link_template: LinkTemplate) -> Self {
        Self {
            timezone,
            langs,
            link_template,
        }
    }

    pub fn canonical_link(&self, disturbance_id: &str) -> String {
        self.link_template.render(disturbance_id)
    }

    /// Build the draft for `status`, threaded after `prior` (the statuses of
    /// this disturbance already posted, in posting order).
    ///
    /// `now` stands in for the status time when upstream omitted it.
    pub fn build(
        &self,
        disturbance: &Disturbance,
        prior: &[KnownStatus],
        status: &Status,
        now: DateTime<Utc>,
    ) -> PostDraft {
        let created_at = status.time.unwrap_or(now);
        let severity = severity_of(status);
        let link = self.canonical_link(&disturbance.id);

        let mut body = String::new();
        if let Some(line) = disturbance.line.as_deref() {
            let label = line.strip_prefix(LINE_CODE_PREFIX).unwrap_or(line);
            body.push_str("Linha ");
            body.push_str(&title_case(label));
            body.push(' ');
        }
        body.push('(');
        body.push_str(
            &created_at
                .with_timezone(&self.timezone)
                .format("%H:%M")
                .to_string(),
        );
        body.push_str("): ");
        body.push_str(severity.marker());
        body.push(' ');
        body.push_str(&status.description);

        let fitted = fit_to_limit(body);
        let facets = fitted
            .marker_span
            .map(|(byte_start, byte_end)| LinkFacet {
                byte_start,
                byte_end,
                uri: link.clone(),
            })
            .into_iter()
            .collect();

        PostDraft {
            text: fitted.text,
            langs: self.langs.clone(),
            created_at,
            severity,
            reply: reply_ref_for(prior),
            facets,
            embed: EmbedRequest { uri: link },
        }
    }
}
