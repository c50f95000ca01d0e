//!
//! Configuration validation for relaymux.
//!
//! Checks network settings, credential sources, endpoint URLs and the
//! consistency of the model catalog with its redirect table. Every finding is
//! collected before anything is reported.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use crate::config::{Config, LogLevel};
use crate::error::{ProxyError, Result};
use crate::provider::ProviderFamily;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

///
/// A single validation finding with an optional hint on how to fix it.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /** configuration key the finding is about */
    pub field: String,
    pub severity: ValidationSeverity,
    pub message: String,
    pub suggestion: Option<String>,
}

///
/// Configuration validator collecting issues across every section.
pub struct ConfigValidator<'a> {
    /// Configuration to validate
    config: &'a Config,
    /// Findings collected so far
    issues: Vec<ValidationIssue>,
}

/* --- implementations --------------------------------------------------------------------- */

impl<'a> ConfigValidator<'a> {
    /// Create a new configuration validator
    pub fn new(config: &'a Config) -> Self {
        Self { config, issues: Vec::new() }
    }

    ///
    /// Run every check and return all findings.
    ///
    /// # Returns
    ///  * Vector of validation issues (empty if all valid)
    pub fn issues(mut self) -> Vec<ValidationIssue> {
        self.validate_server_config();
        self.validate_credentials_config();
        self.validate_upstream_config();
        self.validate_catalog();
        self.issues
    }

    ///
    /// Run every check, log warnings and fail if any error was found.
    ///
    /// # Returns
    ///  * `Ok(())` - Configuration is valid (warnings allowed)
    ///  * `Err(ProxyError)` - One or more errors, all listed in the message
    pub fn validate(self) -> Result<()> {
        let issues = self.issues();

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Warning) {
            tracing::warn!("Configuration warning [{}]: {}", issue.field, issue.message);
        }

        let errors: Vec<&ValidationIssue> =
            issues.iter().filter(|i| i.severity == ValidationSeverity::Error).collect();

        if !errors.is_empty() {
            let error_msg = format!(
                "Configuration validation failed with {} error(s):\n\n{}\n\
                 \n\
                 Please fix these issues and try again.\n\
                 Run 'relaymux validate' to see every finding.",
                errors.len(),
                errors
                    .iter()
                    .enumerate()
                    .map(|(i, e)| format!("{}. [{}] {}", i + 1, e.field, e.message))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
            return Err(ProxyError::Config(error_msg));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /* --- private validation methods ------------------------------------------------------ */

    /// Validate server configuration
    fn validate_server_config(&mut self) {
        let server = &self.config.server;

        if server.port == 0 {
            self.push(
                "server.port",
                ValidationSeverity::Error,
                "Port cannot be 0".to_string(),
                Some("Use a valid port number between 1 and 65535"),
            );
        } else if server.port < 1024 {
            self.push(
                "server.port",
                ValidationSeverity::Warning,
                format!("Server port {} requires root/administrator privileges", server.port),
                None,
            );
        }

        if server.max_dispatch_attempts == 0 {
            self.push(
                "server.max_dispatch_attempts",
                ValidationSeverity::Error,
                "max_dispatch_attempts must be at least 1".to_string(),
                Some("The default of 10 covers pools of up to ten credentials"),
            );
        }

        if server.request_timeout_secs == 0 {
            self.push(
                "server.request_timeout_secs",
                ValidationSeverity::Error,
                "request_timeout_secs cannot be 0".to_string(),
                None,
            );
        }

        if server.log_level == LogLevel::Trace {
            self.push(
                "server.log_level",
                ValidationSeverity::Warning,
                "Trace log level enabled: request bodies may be logged".to_string(),
                None,
            );
        }

        if server.debug_errors {
            self.push(
                "server.debug_errors",
                ValidationSeverity::Warning,
                "Verbose error mode enabled: internal error detail is returned to clients"
                    .to_string(),
                Some("Disable debug_errors outside of local debugging"),
            );
        }
    }

    /// Validate credential sources
    fn validate_credentials_config(&mut self) {
        let credentials = &self.config.credentials;
        let has_keys = credentials.keys.iter().any(|k| !k.trim().is_empty());
        let has_file = credentials.keys_file.is_some();

        match &credentials.refresh {
            Some(refresh) => {
                if has_keys || has_file {
                    self.push(
                        "credentials",
                        ValidationSeverity::Warning,
                        "Both a key list and a refreshable token are configured; the refreshable \
                         token is used"
                            .to_string(),
                        None,
                    );
                }
                if !is_http_url(&refresh.url) {
                    self.push(
                        "credentials.refresh.url",
                        ValidationSeverity::Error,
                        format!("Token exchange URL must be http(s): '{}'", refresh.url),
                        None,
                    );
                }
                if refresh.refresh_token.trim().is_empty() {
                    self.push(
                        "credentials.refresh.refresh_token",
                        ValidationSeverity::Error,
                        "Refresh token is empty".to_string(),
                        None,
                    );
                }
            }
            None if !has_keys && !has_file => {
                self.push(
                    "credentials",
                    ValidationSeverity::Error,
                    "No upstream credentials configured".to_string(),
                    Some(
                        "Set credentials.keys = [\"sk-...\"], credentials.keys_file, \
                         or RELAYMUX_CREDENTIALS_KEYS",
                    ),
                );
            }
            None => {}
        }

        if let Some(ref file) = credentials.keys_file {
            match crate::config::paths::expand_path(file) {
                Ok(path) if !path.is_file() => self.push(
                    "credentials.keys_file",
                    ValidationSeverity::Error,
                    format!("Credential keys file not found: '{}'", path.display()),
                    None,
                ),
                Err(e) => self.push(
                    "credentials.keys_file",
                    ValidationSeverity::Error,
                    e.to_string(),
                    None,
                ),
                Ok(_) => {}
            }
        }
    }

    /// Validate outbound settings
    fn validate_upstream_config(&mut self) {
        let supported = ["http://", "https://", "socks5://", "socks5h://"];
        for proxy in self.config.upstream.proxy_urls() {
            if !supported.iter().any(|scheme| proxy.starts_with(scheme)) {
                self.push(
                    "upstream.proxy",
                    ValidationSeverity::Error,
                    format!("Unsupported proxy URL '{}'", proxy),
                    Some("Use an http://, https:// or socks5:// proxy URL"),
                );
            }
        }

        if self.config.upstream.user_agent.trim().is_empty() {
            self.push(
                "upstream.user_agent",
                ValidationSeverity::Warning,
                "Empty user agent; some upstreams reject anonymous clients".to_string(),
                None,
            );
        }
    }

    /// Validate endpoints, models and redirects against each other
    fn validate_catalog(&mut self) {
        let endpoints = &self.config.endpoints;

        for family in ProviderFamily::ALL {
            if let Some(endpoint) = endpoints.get(family) {
                let field = format!("endpoints.{}.base_url", family.as_str());
                if endpoint.base_url.trim().is_empty() {
                    self.push(&field, ValidationSeverity::Error, "Base URL is empty".to_string(), None);
                } else if !is_http_url(&endpoint.base_url) {
                    self.push(
                        &field,
                        ValidationSeverity::Error,
                        format!("Base URL must be http(s): '{}'", endpoint.base_url),
                        None,
                    );
                } else if endpoint.base_url.starts_with("http://") {
                    self.push(
                        &field,
                        ValidationSeverity::Info,
                        format!("Endpoint uses plain HTTP: {}", endpoint.base_url),
                        Some("Use https:// for remote upstreams"),
                    );
                }
            }
        }

        if self.config.models.is_empty() {
            self.push(
                "models",
                ValidationSeverity::Warning,
                "Model catalog is empty; every chat request will be rejected".to_string(),
                None,
            );
        }

        for (id, model) in &self.config.models {
            if endpoints.get(model.family).is_none() {
                self.push(
                    &format!("models.{}.type", id),
                    ValidationSeverity::Error,
                    format!(
                        "Model '{}' uses type '{}' but no [endpoints.{}] is configured",
                        id,
                        model.family.as_str(),
                        model.family.as_str()
                    ),
                    None,
                );
            }
        }

        for (alias, target) in &self.config.redirects {
            if !self.config.models.contains_key(target) {
                self.push(
                    &format!("redirects.{}", alias),
                    ValidationSeverity::Error,
                    format!("Redirect '{}' points at unknown model '{}'", alias, target),
                    None,
                );
            }
        }
    }

    /// Record a finding
    fn push(
        &mut self,
        field: &str,
        severity: ValidationSeverity,
        message: String,
        suggestion: Option<&str>,
    ) {
        tracing::debug!("Validation {:?} [{}]: {}", severity, field, message);
        self.issues.push(ValidationIssue {
            field: field.to_string(),
            severity,
            message,
            suggestion: suggestion.map(str::to_string),
        });
    }
}

/* --- utility functions ------------------------------------------------------------------- */

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/* --- tests ------------------------------------------------------------------------------- */
