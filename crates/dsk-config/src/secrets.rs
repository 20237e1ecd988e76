//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (`publisher.keys_env.*`). Callers
//! invoke [`resolve_secrets`] once at startup and pass the result into the
//! publisher constructor; nothing else reads these variables.
//!
//! Error messages reference the env var NAME, never the value, and `Debug`
//! redacts values.

use anyhow::{bail, Result};
use serde_json::Value;

/// Publisher login resolved from the environment.
#[derive(Clone)]
pub struct PublisherCredentials {
    pub handle: String,
    pub app_password: String,
}

impl std::fmt::Debug for PublisherCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The handle is public; the password never is.
        f.debug_struct("PublisherCredentials")
            .field("handle", &self.handle)
            .field("app_password", &"<REDACTED>")
            .finish()
    }
}

/// Read a non-empty string value at `pointer`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve the publisher credentials named by the config.
///
/// Falls back to `DSK_BSKY_HANDLE` / `DSK_BSKY_APP_PASSWORD` when the config
/// does not name the variables. Both are required.
pub fn resolve_secrets(config_json: &Value) -> Result<PublisherCredentials> {
    let handle_var = read_str_at(config_json, "/publisher/keys_env/handle")
        .unwrap_or_else(|| "DSK_BSKY_HANDLE".to_string());
    let password_var = read_str_at(config_json, "/publisher/keys_env/app_password")
        .unwrap_or_else(|| "DSK_BSKY_APP_PASSWORD".to_string());

    let Some(handle) = resolve_env(&handle_var) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (publisher handle) is not set or empty",
            handle_var,
        );
    };
    let Some(app_password) = resolve_env(&password_var) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (publisher app password) is not set or empty",
            password_var,
        );
    };

    Ok(PublisherCredentials {
        handle: handle.trim().to_string(),
        app_password,
    })
}
