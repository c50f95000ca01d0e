//! Configuration module tests
//!
//! Tests for layered configuration loading: TOML files, `RELAYMUX_*`
//! environment overrides, credential key files and the model catalog.
//!
//! Uses temp-env to safely manage environment variables during tests, automatically
//! restoring them after each test completes.

use std::fs;
use std::sync::Arc;

use relaymux::config::loader::ConfigLoader;
use relaymux::config::{Config, LogLevel};
use relaymux::converter::ReasoningPolicy;
use relaymux::provider::{ConfigCatalog, ModelCatalog, ProviderFamily};
use temp_env::with_vars;
use tempfile::TempDir;

const CATALOG_TOML: &str = r#"
[server]
port = 8081
log_level = "debug"

[credentials]
keys = ["sk-primary-aaaa", "sk-fallback-bbbb"]

[upstream]
system_prompt = "Answer briefly."

[endpoints.anthropic]
base_url = "https://anthropic.example.com/"

[endpoints.openai]
base_url = "https://openai.example.com"
path = "/v1/responses"

[models."claude-sonnet-4-5"]
type = "anthropic"
reasoning = "high"
display_name = "Claude Sonnet"

[models."gpt-5.1-2025-11-13"]
type = "openai"
provider = "azure"

[redirects]
"gpt-5.1" = "gpt-5.1-2025-11-13"
"#;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

fn load_file(path: &std::path::Path) -> relaymux::error::Result<Config> {
    ConfigLoader::new().with_defaults().with_config_file(path)?.with_env_vars()?.build()
}

/// Test that a catalog file loads with every section
#[test]
fn test_catalog_file_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG_TOML);

    with_vars(vec![("RELAYMUX_SERVER_PORT", None::<&str>), ("RELAYMUX_CREDENTIALS_KEYS", None)], || {
        let config = load_file(&path).expect("catalog config should load");

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.log_level, LogLevel::Debug);
        assert_eq!(config.credentials.keys.len(), 2);
        assert_eq!(config.system_prompt(), Some("Answer briefly."));
        assert_eq!(config.models["claude-sonnet-4-5"].reasoning, ReasoningPolicy::High);
        assert_eq!(config.models["gpt-5.1-2025-11-13"].reasoning, ReasoningPolicy::Auto);
    });
}

/// Test that environment variables override file values
#[test]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG_TOML);

    with_vars(
        vec![
            ("RELAYMUX_SERVER_PORT", Some("9090")),
            ("RELAYMUX_SERVER_LOG_LEVEL", Some("WARN")),
            ("RELAYMUX_SERVER_DEBUG_ERRORS", Some("yes")),
            ("RELAYMUX_CREDENTIALS_KEYS", Some("sk-env-one, ,sk-env-two")),
        ],
        || {
            let config = load_file(&path).expect("config with env overrides should load");

            assert_eq!(config.server.port, 9090);
            assert_eq!(config.server.log_level, LogLevel::Warn);
            assert!(config.server.debug_errors);
            assert_eq!(config.credentials.keys, vec!["sk-env-one", "sk-env-two"]);
        },
    );
}

/// Test that an invalid port override is reported
#[test]
fn test_invalid_port_env() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG_TOML);

    with_vars(vec![("RELAYMUX_SERVER_PORT", Some("not-a-port"))], || {
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("RELAYMUX_SERVER_PORT"));
    });
}

/// Test that an explicitly requested file must exist
#[test]
fn test_missing_explicit_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(ConfigLoader::new().with_defaults().with_config_file(&missing).is_err());
}

/// Test that a malformed catalog reports the parse problem
#[test]
fn test_unknown_model_type_fails_to_parse() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[models.\"x\"]\ntype = \"gemini\"\n");

    let err = ConfigLoader::new().with_defaults().with_config_file(&path).err().unwrap();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

/// Test that keys from inline list and key file are combined in order
#[test]
fn test_credential_keys_file() {
    let dir = TempDir::new().unwrap();
    let keys_path = dir.path().join("keys.txt");
    fs::write(&keys_path, "# primary is inline\nsk-file-one\n\n  sk-file-two  \n").unwrap();

    let mut config = Config::default();
    config.credentials.keys = vec!["sk-inline".to_string()];
    config.credentials.keys_file = Some(keys_path.display().to_string());

    assert_eq!(config.load_credential_keys().unwrap(), vec!["sk-inline", "sk-file-one", "sk-file-two"]);
}

/// Test that the catalog resolves redirects, endpoints and policies
#[test]
fn test_catalog_lookups() {
    let config: Config = toml::from_str(CATALOG_TOML).unwrap();
    let catalog = ConfigCatalog::new(Arc::new(config));

    assert_eq!(catalog.resolve_model("gpt-5.1").as_deref(), Some("gpt-5.1-2025-11-13"));
    assert_eq!(catalog.resolve_model(" claude-sonnet-4-5 ").as_deref(), Some("claude-sonnet-4-5"));
    assert_eq!(catalog.resolve_model("unknown"), None);
    assert_eq!(catalog.resolve_model(""), None);

    let info = catalog.get_model("gpt-5.1-2025-11-13").unwrap();
    assert_eq!(info.family, ProviderFamily::OpenAi);
    assert_eq!(info.provider, "azure");
    assert_eq!(catalog.get_model("claude-sonnet-4-5").unwrap().provider, "anthropic");

    let endpoint = catalog.get_endpoint(ProviderFamily::Anthropic).unwrap();
    assert_eq!(endpoint.url(), "https://anthropic.example.com/v1/messages");
    assert!(catalog.get_endpoint(ProviderFamily::Common).is_none());

    assert_eq!(catalog.reasoning_policy("claude-sonnet-4-5"), ReasoningPolicy::High);
    assert_eq!(catalog.reasoning_policy("unknown"), ReasoningPolicy::Auto);
    assert_eq!(catalog.system_prompt().as_deref(), Some("Answer briefly."));
}

/// Test that the listing exposes catalog ids and redirect aliases
#[test]
fn test_listed_models_are_resolvable() {
    let config: Config = toml::from_str(CATALOG_TOML).unwrap();
    let catalog = ConfigCatalog::new(Arc::new(config));

    let listed = catalog.list_models();
    assert_eq!(listed.len(), 3);
    for model in &listed {
        assert!(catalog.resolve_model(&model.id).is_some(), "{} must resolve", model.id);
    }
    let sonnet = listed.iter().find(|m| m.id == "claude-sonnet-4-5").unwrap();
    assert_eq!(sonnet.display_name.as_deref(), Some("Claude Sonnet"));
}

/// Test that a later file leaving out server flags keeps earlier values
#[test]
fn test_omitted_flags_do_not_reset_earlier_layers() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("user.toml");
    fs::write(&first, "[server]\ndebug_errors = true\nlog_level = \"debug\"\n").unwrap();
    let second = dir.path().join("explicit.toml");
    fs::write(&second, "[server]\nport = 4000\n").unwrap();

    with_vars(vec![("RELAYMUX_SERVER_DEBUG_ERRORS", None::<&str>), ("RELAYMUX_SERVER_LOG_LEVEL", None)], || {
        let config = ConfigLoader::new()
            .with_defaults()
            .with_config_file(&first)
            .and_then(|l| l.with_config_file(&second))
            .and_then(|l| l.with_env_vars())
            .and_then(|l| l.build_unchecked())
            .unwrap();

        assert!(config.server.debug_errors);
        assert_eq!(config.server.log_level, LogLevel::Debug);
        assert_eq!(config.server.port, 4000);
    });
}

/// Test that the proxy and proxy list combine in order without duplicates
#[test]
fn test_proxy_list() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "[upstream]\nproxy = \"http://p1:3128\"\nproxies = [\"http://p2:3128\", \"http://p1:3128\"]\n",
    );
    let config = ConfigLoader::new().with_defaults().with_config_file(&path).unwrap().build_unchecked().unwrap();

    assert_eq!(config.upstream.proxy_urls(), vec!["http://p1:3128", "http://p2:3128"]);
}
