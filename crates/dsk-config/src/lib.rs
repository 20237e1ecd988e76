//! dsk-config
//!
//! Layered YAML configuration for the mirroring bot.
//!
//! - Docs are merged in order (later overrides earlier) into one JSON value.
//! - The merged value is canonicalized and hashed; the hash is logged at
//!   startup so two runs can be compared.
//! - Literal secrets are rejected: YAML carries env var NAMES only.
//! - Keys the bot never reads are reported (see [`report_unused_keys`]).

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

mod bot;
mod secrets;

pub use bot::{
    BotConfig, ContentSection, FeedSection, LoopSection, PublisherKeysEnv, PublisherSection,
    StoreSection,
};
pub use secrets::{resolve_secrets, PublisherCredentials};

/// Leaf strings starting with one of these abort loading with
/// CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN", // PEM private keys
    "eyJ",        // JWT, e.g. a pasted Bluesky accessJwt
    "ghp_",       // GitHub PAT
    "sk-",        // generic API key style
];

/// JSON-pointer prefixes the bot reads; keep in sync with [`BotConfig`].
/// Any other leaf is reported as unused.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/feed/endpoint",
    "/publisher/host",
    "/publisher/keys_env/handle",
    "/publisher/keys_env/app_password",
    "/store/checkpoint_path",
    "/content/timezone",
    "/content/langs",
    "/content/link_template",
    "/loop/interval_secs",
    "/loop/iteration_timeout_secs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Default)]
pub struct UnusedKeyReport {
    /// Sorted leaf pointers outside [`CONSUMED_POINTERS`].
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report config leaves the bot never reads. With `UnusedKeyPolicy::Fail`,
/// any unused leaf is a CONFIG_UNUSED_KEYS error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let unused: BTreeSet<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !CONSUMED_POINTERS.iter().any(|c| is_prefix_pointer(c, ptr)))
        .collect();
    let report = UnusedKeyReport {
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: dsk-daemon does not read {:?}",
            report.unused_leaf_pointers
        );
    }
    Ok(report)
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Every scalar leaf with its JSON pointer, in key order.
fn leaves(v: &Value) -> Vec<(String, &Value)> {
    fn walk<'a>(v: &'a Value, at: String, out: &mut Vec<(String, &'a Value)>) {
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    walk(child, format!("{at}/{token}"), out);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    walk(child, format!("{at}/{i}"), out);
                }
            }
            _ => out.push((at, v)),
        }
    }
    let mut out = Vec::new();
    walk(v, String::new(), &mut out);
    out
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Deserialize and validate the typed bot settings.
    pub fn bot(&self) -> Result<BotConfig> {
        BotConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    // serde_json's default Map is ordered by key, so this is stable under
    // key reordering in the source docs.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key; anything else in `b` replaces `a`.
fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    for (ptr, leaf) in leaves(v) {
        if leaf.as_str().is_some_and(looks_like_secret) {
            bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
        }
    }
    Ok(())
}

/// Prefixed tokens, or the `xxxx-xxxx-xxxx-xxxx` shape of a Bluesky app
/// password.
fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) || is_app_password(t)
}

fn is_app_password(t: &str) -> bool {
    let groups: Vec<&str> = t.split('-').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| g.len() == 4 && g.chars().all(|c| c.is_ascii_alphanumeric()))
}
