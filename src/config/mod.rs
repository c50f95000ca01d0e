//!
//! Configuration management for relaymux.
//!
//! Provides the static configuration the gateway runs from:
//! - Platform-native configuration directories (XDG on Linux, standard paths on macOS/Windows)
//! - TOML format for human-readable configuration files
//! - Multi-layered configuration hierarchy (env vars > explicit file > user config > system config > defaults)
//! - Model catalog, redirect table, endpoint URLs and per-model reasoning policy
//!
//! Submodules:
//! - `loader.rs` - Configuration loading logic
//! - `paths.rs` - Platform-native path resolution
//! - `validation.rs` - Configuration validation
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- modules --------------------------------------------------------------------------------- */

pub mod loader;
pub mod paths;
pub mod validation;

/* --- uses ------------------------------------------------------------------------------------ */

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::converter::policy::ReasoningPolicy;
use crate::error::{ProxyError, Result};
use crate::provider::ProviderFamily;

pub use validation::{ValidationIssue, ValidationSeverity};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Main application configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream credential pool source
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Outbound transport and policy settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Base URLs per provider family
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Model catalog keyed by canonical model id
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
    /// Redirect table: client-facing id -> catalog id
    #[serde(default)]
    pub redirects: BTreeMap<String, String>,
}

///
/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server port number
    #[serde(default = "default_port")]
    pub port: u16,
    /// Application logging level
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    /// Echo internal error detail to clients (operator debugging only)
    #[serde(default)]
    pub debug_errors: bool,
    /// Upper bound on upstream attempts for a single logical request
    #[serde(default = "default_max_dispatch_attempts")]
    pub max_dispatch_attempts: u32,
    /// Outbound HTTP client timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

///
/// Source of upstream credentials.
///
/// Either an ordered key list (first entry is the primary, the rest are
/// fallbacks) or a single refreshable token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Inline ordered key list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// File with one key per line (`#` starts a comment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_file: Option<String>,
    /// Refreshable token source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshConfig>,
}

///
/// Token exchange settings for the refreshable credential mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Token exchange endpoint
    pub url: String,
    /// Long-lived secret presented to the exchange endpoint
    pub refresh_token: String,
    /// Seconds a fetched token is considered fresh when the endpoint gives no expiry
    #[serde(default = "default_refresh_ttl")]
    pub ttl_secs: u64,
}

///
/// Outbound request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Forward proxy used as the transport route for every upstream call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Additional forward proxies; upstream calls round-robin over all of them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,
    /// Outbound identification string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// System prompt injected into every upstream request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

///
/// Upstream base URLs, one per provider family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<EndpointConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<EndpointConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<EndpointConfig>,
}

///
/// A single upstream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Scheme + host (+ optional prefix), without the API path
    pub base_url: String,
    /// API path override; the family default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

///
/// Catalog entry for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Wire protocol family used to reach the model
    #[serde(rename = "type")]
    pub family: ProviderFamily,
    /// Routing tag forwarded to the upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Reasoning policy applied to every request for this model
    #[serde(default)]
    pub reasoning: ReasoningPolicy,
    /// Human-readable name shown in the model listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

///
/// Logging level enumeration.
///
/// Defines available log levels compatible with tracing crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/* --- defaults -------------------------------------------------------------------------------- */

/// Default HTTP port
fn default_port() -> u16 {
    3000
}

/// Default logging level
fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Default dispatch attempt ceiling
fn default_max_dispatch_attempts() -> u32 {
    10
}

/// Default outbound timeout (5 minutes, long generations stream for a while)
fn default_request_timeout() -> u64 {
    300
}

/// Default refreshed token lifetime
fn default_refresh_ttl() -> u64 {
    1500
}

fn default_user_agent() -> String {
    format!("relaymux/{}", env!("CARGO_PKG_VERSION"))
}

/* --- implementations --------------------------------------------------------------------- */

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            debug_errors: false,
            max_dispatch_attempts: default_max_dispatch_attempts(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { proxy: None, proxies: Vec::new(), user_agent: default_user_agent(), system_prompt: None }
    }
}

impl UpstreamConfig {
    ///
    /// Every configured forward proxy, `proxy` first, blanks and duplicates removed.
    pub fn proxy_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = Vec::new();
        for url in self.proxy.iter().chain(self.proxies.iter()) {
            let url = url.trim();
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

impl EndpointsConfig {
    /// Endpoint configured for a provider family, if any
    pub fn get(&self, family: ProviderFamily) -> Option<&EndpointConfig> {
        match family {
            ProviderFamily::Anthropic => self.anthropic.as_ref(),
            ProviderFamily::OpenAi => self.openai.as_ref(),
            ProviderFamily::Common => self.common.as_ref(),
        }
    }
}

impl Config {
    /// Load configuration from the standard hierarchy:
    /// 1. Environment variables (highest priority)
    /// 2. Explicit config file (`--config`)
    /// 3. User config file (~/.config/relaymux/config.toml)
    /// 4. System config file (/etc/relaymux/config.toml)
    /// 5. Built-in defaults (lowest priority)
    ///
    /// The result is validated before it is returned.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let mut loader = loader::ConfigLoader::new().with_defaults().with_system_config()?.with_user_config()?;
        if let Some(path) = explicit_file {
            loader = loader.with_config_file(path)?;
        }
        loader.with_env_vars()?.build()
    }

    /// Validate the current configuration, failing on the first batch of errors
    pub fn validate(&self) -> Result<()> {
        validation::ConfigValidator::new(self).validate()
    }

    /// All validation findings, including warnings and informational notes
    pub fn validation_issues(&self) -> Vec<ValidationIssue> {
        validation::ConfigValidator::new(self).issues()
    }

    /// Configured system prompt, `None` when unset or blank
    pub fn system_prompt(&self) -> Option<&str> {
        self.upstream.system_prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    ///
    /// Resolve the ordered upstream key list.
    ///
    /// Inline keys come first, followed by the keys read from `keys_file`.
    /// Blank lines and `#` comments in the file are skipped.
    pub fn load_credential_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .credentials
            .keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if let Some(ref file_path) = self.credentials.keys_file {
            let expanded_path = paths::expand_path(file_path)?;
            let contents = std::fs::read_to_string(&expanded_path).map_err(|e| {
                ProxyError::Config(format!(
                    "Failed to read credential keys file '{}': {}\n\
                     \n\
                     To fix this:\n\
                     1. Verify the file exists and is readable\n\
                     2. Check file permissions (should be 600 or similar)\n\
                     3. Ensure the path is correct",
                    expanded_path.display(),
                    e
                ))
            })?;

            keys.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }

        Ok(keys)
    }

    /// Get configuration file example as TOML string
    pub fn example_toml() -> &'static str {
        r#"# relaymux configuration
# Linux/Unix: ~/.config/relaymux/config.toml
# macOS: ~/Library/Application Support/relaymux/config.toml

[server]
port = 3000
log_level = "info"
# Echo internal error details to clients (debugging only)
debug_errors = false
# Upper bound on upstream attempts per request
max_dispatch_attempts = 10

[credentials]
# First key is the primary, the rest are fallbacks tried on 401/402/403/429
keys = ["sk-primary", "sk-fallback-1"]
# keys_file = "~/.config/relaymux/keys.txt"

# Alternative: single refreshable token
# [credentials.refresh]
# url = "https://auth.example.com/token"
# refresh_token = "rt-..."

[upstream]
# proxy = "http://127.0.0.1:8080"
# proxies = ["http://10.0.0.2:3128", "socks5://10.0.0.3:1080"]
system_prompt = ""

[endpoints.anthropic]
base_url = "https://api.anthropic.com"

[endpoints.openai]
base_url = "https://api.openai.com"

[models."claude-sonnet-4-5"]
type = "anthropic"
provider = "anthropic"
reasoning = "medium"

[models."gpt-5.1-2025-11-13"]
type = "openai"
provider = "openai"
reasoning = "auto"

[redirects]
"gpt-5.1" = "gpt-5.1-2025-11-13"
"#
    }
}

impl LogLevel {
    /// Convert to tracing::Level for logging setup
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ProxyError::Config(format!(
                "Invalid log level '{}'. Valid levels are: trace, debug, info, warn, error",
                s
            ))),
        }
    }
}
