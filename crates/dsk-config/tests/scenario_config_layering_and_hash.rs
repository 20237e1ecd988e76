//! Scenario: layered YAML loading and config hashing
//!
//! # Invariants under test
//!
//! 1. Later layers override earlier ones leaf by leaf.
//! 2. The same input always yields the same hash; key order does not matter.
//! 3. Different effective values yield different hashes.
//! 4. Literal secrets are rejected with CONFIG_SECRET_DETECTED.
//! 5. The shipped base config loads, validates and leaves no unused keys.

use dsk_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy,
};

const BASE_YAML: &str = r#"
feed:
  endpoint: "https://feed.example/v1"
publisher:
  host: "https://bsky.example"
  keys_env:
    handle: "DSK_TEST_HANDLE"
    app_password: "DSK_TEST_APP_PASSWORD"
store:
  checkpoint_path: "state/checkpoint.json"
content:
  timezone: "Europe/Lisbon"
  langs: ["pt-PT"]
  link_template: "https://site.example/d/%s"
loop:
  interval_secs: 10
  iteration_timeout_secs: 120
"#;

const BASE_YAML_REORDERED: &str = r#"
loop:
  iteration_timeout_secs: 120
  interval_secs: 10
content:
  link_template: "https://site.example/d/%s"
  langs: ["pt-PT"]
  timezone: "Europe/Lisbon"
store:
  checkpoint_path: "state/checkpoint.json"
publisher:
  keys_env:
    app_password: "DSK_TEST_APP_PASSWORD"
    handle: "DSK_TEST_HANDLE"
  host: "https://bsky.example"
feed:
  endpoint: "https://feed.example/v1"
"#;

const OVERLAY_YAML: &str = r#"
loop:
  interval_secs: 30
content:
  langs: ["pt-PT", "en"]
"#;

#[test]
fn overlay_overrides_leaves_and_keeps_the_rest() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let bot = loaded.bot().unwrap();

    assert_eq!(bot.polling.interval_secs, 30);
    assert_eq!(bot.polling.iteration_timeout_secs, 120);
    assert_eq!(bot.content.langs, vec!["pt-PT".to_string(), "en".to_string()]);
    assert_eq!(bot.feed.endpoint, "https://feed.example/v1");
}

#[test]
fn hash_is_stable_and_order_independent() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let c = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash, c.config_hash, "key order must not change the hash");
    assert_eq!(a.canonical_json, c.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex");
}

#[test]
fn different_values_produce_different_hashes() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);
}

#[test]
fn literal_secret_is_rejected() {
    let leaked = r#"
publisher:
  keys_env:
    app_password: "eyJhbGciOiJIUzI1NiJ9.payload.sig"
"#;
    let err = load_layered_yaml_from_strings(&[BASE_YAML, leaked]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "got: {msg}");
    assert!(msg.contains("/publisher/keys_env/app_password"), "got: {msg}");
    assert!(!msg.contains("eyJhbGci"), "value must not leak: {msg}");
}

#[test]
fn literal_app_password_is_rejected() {
    let leaked = r#"
publisher:
  keys_env:
    app_password: "abcd-2f4g-h6jk-8lmn"
"#;
    let msg = load_layered_yaml_from_strings(&[BASE_YAML, leaked])
        .unwrap_err()
        .to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "got: {msg}");
    assert!(!msg.contains("abcd-2f4g"), "value must not leak: {msg}");
}

#[test]
fn invalid_yaml_is_an_error() {
    assert!(load_layered_yaml_from_strings(&["feed: [unclosed"]).is_err());
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/nonexistent/dsk/base.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/dsk/base.yaml"));
}

#[test]
fn shipped_base_config_is_valid_and_fully_consumed() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/base.yaml");
    let loaded = load_layered_yaml(&[path]).unwrap();
    let bot = loaded.bot().unwrap();
    assert_eq!(bot.content.timezone, "Europe/Lisbon");

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean(), "unused: {:?}", report.unused_leaf_pointers);
}
