use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use dsk_content::{LinkTemplate, PostContentBuilder};
use serde::Deserialize;
use serde_json::Value;

/// Typed view of the merged config. Build it with [`BotConfig::from_json`],
/// which also validates it.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub feed: FeedSection,
    pub publisher: PublisherSection,
    pub store: StoreSection,
    pub content: ContentSection,
    #[serde(rename = "loop", default)]
    pub polling: LoopSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    /// Base URL of the disturbances API, e.g. `https://api.example/v1`.
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherSection {
    /// XRPC host, e.g. `https://bsky.social`.
    pub host: String,
    #[serde(default)]
    pub keys_env: PublisherKeysEnv,
}

/// Env var NAMES holding the publisher credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherKeysEnv {
    #[serde(default = "default_handle_env")]
    pub handle: String,
    #[serde(default = "default_app_password_env")]
    pub app_password: String,
}

impl Default for PublisherKeysEnv {
    fn default() -> Self {
        Self {
            handle: default_handle_env(),
            app_password: default_app_password_env(),
        }
    }
}

fn default_handle_env() -> String {
    "DSK_BSKY_HANDLE".to_string()
}

fn default_app_password_env() -> String {
    "DSK_BSKY_APP_PASSWORD".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    pub checkpoint_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentSection {
    /// IANA zone name used for the HH:MM stamp in post text.
    pub timezone: String,
    #[serde(default = "default_langs")]
    pub langs: Vec<String>,
    /// Canonical link for a disturbance; `%s` is replaced by its id.
    pub link_template: String,
}

fn default_langs() -> Vec<String> {
    vec!["pt-PT".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_iteration_timeout_secs")]
    pub iteration_timeout_secs: u64,
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            iteration_timeout_secs: default_iteration_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_iteration_timeout_secs() -> u64 {
    120
}

impl BotConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: BotConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.endpoint.trim().is_empty() {
            bail!("CONFIG_INVALID /feed/endpoint: must not be empty");
        }
        if self.publisher.host.trim().is_empty() {
            bail!("CONFIG_INVALID /publisher/host: must not be empty");
        }
        if self.store.checkpoint_path.as_os_str().is_empty() {
            bail!("CONFIG_INVALID /store/checkpoint_path: must not be empty");
        }
        self.timezone()?;
        self.link_template()?;
        if self.content.langs.iter().any(|l| l.trim().is_empty()) {
            bail!("CONFIG_INVALID /content/langs: blank language tag");
        }
        if self.polling.interval_secs == 0 {
            bail!("CONFIG_INVALID /loop/interval_secs: must be positive");
        }
        if self.polling.iteration_timeout_secs == 0 {
            bail!("CONFIG_INVALID /loop/iteration_timeout_secs: must be positive");
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.content.timezone.parse::<Tz>().map_err(|_| {
            anyhow::anyhow!(
                "CONFIG_INVALID /content/timezone: unknown IANA zone '{}'",
                self.content.timezone
            )
        })
    }

    pub fn link_template(&self) -> Result<LinkTemplate> {
        LinkTemplate::parse(&self.content.link_template)
            .map_err(|e| anyhow::anyhow!("CONFIG_INVALID /content/link_template: {e}"))
    }

    pub fn content_builder(&self) -> Result<PostContentBuilder> {
        Ok(PostContentBuilder::new(
            self.timezone()?,
            self.content.langs.clone(),
            self.link_template()?,
        ))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn iteration_timeout(&self) -> Duration {
        Duration::from_secs(self.polling.iteration_timeout_secs)
    }
}
