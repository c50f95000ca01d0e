//! Validation tests for relaymux configuration validation

use relaymux::config::{Config, EndpointConfig, ModelConfig, RefreshConfig, ValidationIssue, ValidationSeverity};
use relaymux::converter::ReasoningPolicy;
use relaymux::provider::ProviderFamily;

fn valid_config() -> Config {
    let mut config = Config::default();
    config.credentials.keys = vec!["sk-primary".to_string()];
    config.endpoints.anthropic =
        Some(EndpointConfig { base_url: "https://api.anthropic.com".to_string(), path: None });
    config.models.insert(
        "claude-sonnet-4-5".to_string(),
        ModelConfig {
            family: ProviderFamily::Anthropic,
            provider: None,
            reasoning: ReasoningPolicy::Medium,
            display_name: None,
        },
    );
    config.redirects.insert("sonnet".to_string(), "claude-sonnet-4-5".to_string());
    config
}

fn find<'a>(issues: &'a [ValidationIssue], field: &str) -> Option<&'a ValidationIssue> {
    issues.iter().find(|i| i.field == field)
}

/// Test that a complete configuration has no errors
#[test]
fn test_valid_config_has_no_errors() {
    let config = valid_config();
    assert!(config.validate().is_ok());
    assert!(config.validation_issues().iter().all(|i| i.severity != ValidationSeverity::Error));
}

/// Test that a redirect to an unknown model is an error
#[test]
fn test_dangling_redirect() {
    let mut config = valid_config();
    config.redirects.insert("gpt-5.1".to_string(), "gpt-5.1-2025-11-13".to_string());

    let issues = config.validation_issues();
    let issue = find(&issues, "redirects.gpt-5.1").expect("dangling redirect must be reported");
    assert_eq!(issue.severity, ValidationSeverity::Error);
    assert!(config.validate().unwrap_err().to_string().contains("gpt-5.1-2025-11-13"));
}

/// Test that a model whose family has no endpoint is an error
#[test]
fn test_model_without_endpoint() {
    let mut config = valid_config();
    config.models.insert(
        "gpt-5.1-2025-11-13".to_string(),
        ModelConfig {
            family: ProviderFamily::OpenAi,
            provider: None,
            reasoning: ReasoningPolicy::Auto,
            display_name: None,
        },
    );

    let issues = config.validation_issues();
    let issue = find(&issues, "models.gpt-5.1-2025-11-13.type").unwrap();
    assert_eq!(issue.severity, ValidationSeverity::Error);
}

/// Test that endpoint URLs must be http(s), and plain http is only noted
#[test]
fn test_endpoint_url_schemes() {
    let mut config = valid_config();
    config.endpoints.anthropic = Some(EndpointConfig { base_url: "ftp://x".to_string(), path: None });
    let issues = config.validation_issues();
    assert_eq!(find(&issues, "endpoints.anthropic.base_url").unwrap().severity, ValidationSeverity::Error);

    config.endpoints.anthropic = Some(EndpointConfig { base_url: "http://localhost:8080".to_string(), path: None });
    let issues = config.validation_issues();
    assert_eq!(find(&issues, "endpoints.anthropic.base_url").unwrap().severity, ValidationSeverity::Info);
    assert!(config.validate().is_ok());
}

/// Test that a missing credential source is an error with a suggestion
#[test]
fn test_missing_credentials() {
    let mut config = valid_config();
    config.credentials.keys = vec!["   ".to_string()];

    let issues = config.validation_issues();
    let issue = find(&issues, "credentials").unwrap();
    assert_eq!(issue.severity, ValidationSeverity::Error);
    assert!(issue.suggestion.as_deref().unwrap().contains("RELAYMUX_CREDENTIALS_KEYS"));
}

/// Test the refreshable token checks
#[test]
fn test_refresh_credentials() {
    let mut config = valid_config();
    config.credentials.refresh = Some(RefreshConfig {
        url: "auth.example.com/token".to_string(),
        refresh_token: "".to_string(),
        ttl_secs: 600,
    });

    let issues = config.validation_issues();
    assert_eq!(find(&issues, "credentials.refresh.url").unwrap().severity, ValidationSeverity::Error);
    assert_eq!(
        find(&issues, "credentials.refresh.refresh_token").unwrap().severity,
        ValidationSeverity::Error
    );
    assert_eq!(find(&issues, "credentials").unwrap().severity, ValidationSeverity::Warning);
}

/// Test that verbose error mode and zero attempts are flagged
#[test]
fn test_server_settings() {
    let mut config = valid_config();
    config.server.debug_errors = true;
    assert_eq!(
        find(&config.validation_issues(), "server.debug_errors").unwrap().severity,
        ValidationSeverity::Warning
    );
    assert!(config.validate().is_ok(), "warnings do not fail validation");

    config.server.max_dispatch_attempts = 0;
    assert!(config.validate().is_err());
}

/// Test that an unsupported proxy scheme is rejected
#[test]
fn test_proxy_scheme() {
    let mut config = valid_config();
    config.upstream.proxy = Some("ftp://proxy:21".to_string());
    assert_eq!(find(&config.validation_issues(), "upstream.proxy").unwrap().severity, ValidationSeverity::Error);

    config.upstream.proxy = Some("socks5://127.0.0.1:1080".to_string());
    assert!(find(&config.validation_issues(), "upstream.proxy").is_none());
}

/// Test that all errors are reported together
#[test]
fn test_every_error_is_listed() {
    let mut config = valid_config();
    config.server.port = 0;
    config.credentials.keys.clear();
    config.redirects.insert("x".to_string(), "missing".to_string());

    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("3 error(s)"));
    assert!(message.contains("[server.port]"));
    assert!(message.contains("[credentials]"));
    assert!(message.contains("[redirects.x]"));
}

/// Test that every entry of the proxy list is checked
#[test]
fn test_proxy_list_scheme() {
    let mut config = valid_config();
    config.upstream.proxies = vec!["http://10.0.0.2:3128".to_string(), "gopher://x".to_string()];

    let issues = config.validation_issues();
    let issue = find(&issues, "upstream.proxy").unwrap();
    assert_eq!(issue.severity, ValidationSeverity::Error);
    assert!(issue.message.contains("gopher://x"));
}
