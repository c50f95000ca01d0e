//!
//! Configuration loading system for relaymux.
//!
//! Builds the final configuration from several layers, later layers winning:
//! 1. Built-in defaults
//! 2. System config file (/etc/relaymux/config.toml)
//! 3. User config file (~/.config/relaymux/config.toml)
//! 4. Explicit config file (`--config <path>`)
//! 5. `RELAYMUX_*` environment variables
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use crate::config::paths;
use crate::config::{Config, CredentialsConfig, LogLevel, ServerConfig, UpstreamConfig};
use crate::error::{ProxyError, Result};

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

/* --- constants ------------------------------------------------------------------------------- */

/// Prefix shared by every recognised environment override
const ENV_PREFIX: &str = "RELAYMUX_";

/* --- types ----------------------------------------------------------------------------------- */

///
/// Configuration loader implementing the Builder pattern.
///
/// Each `with_*` method merges one source over the current state and
/// returns self for chaining.
pub struct ConfigLoader {
    /// Current configuration being built
    config: Config,
    /// Environment variable overrides collected (sorted for deterministic application)
    env_overrides: BTreeMap<String, String>,
    /// Whether defaults have been applied
    defaults_applied: bool,
}

/* --- implementations --------------------------------------------------------------------- */

impl ConfigLoader {
    ///
    /// Create a new configuration loader.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use relaymux::config::loader::ConfigLoader;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ConfigLoader::new()
    ///     .with_defaults()
    ///     .with_user_config()?
    ///     .with_env_vars()?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self { config: Config::default(), env_overrides: BTreeMap::new(), defaults_applied: false }
    }

    /// Apply built-in default values
    pub fn with_defaults(mut self) -> Self {
        self.config = Config::default();
        self.defaults_applied = true;
        self
    }

    ///
    /// Load the system-wide configuration file, if present.
    ///
    /// # Returns
    ///  * `Ok(Self)` - System config loaded or skipped (file not found)
    ///  * `Err(ProxyError)` - System config exists but failed to load
    pub fn with_system_config(mut self) -> Result<Self> {
        let system_config_path = paths::system_config_file()?;

        if system_config_path.exists() {
            tracing::debug!("Loading system config from: {}", system_config_path.display());
            self.load_config_file(&system_config_path)?;
        } else {
            tracing::debug!("System config not found at: {}", system_config_path.display());
        }

        Ok(self)
    }

    ///
    /// Load the per-user configuration file, if present.
    ///
    /// # Returns
    ///  * `Ok(Self)` - User config loaded or skipped (file not found)
    ///  * `Err(ProxyError)` - User config exists but failed to load
    pub fn with_user_config(mut self) -> Result<Self> {
        let user_config_path = paths::user_config_file()?;

        if user_config_path.exists() {
            tracing::debug!("Loading user config from: {}", user_config_path.display());
            self.load_config_file(&user_config_path)?;
        } else {
            tracing::debug!("User config not found at: {}", user_config_path.display());
        }

        Ok(self)
    }

    ///
    /// Load configuration from a specific file path.
    ///
    /// Unlike the system and user layers, a missing file is an error here:
    /// the operator asked for it explicitly.
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = paths::expand_path(path)?;
        tracing::debug!("Loading custom config from: {}", path.display());
        self.load_config_file(&path)?;
        Ok(self)
    }

    ///
    /// Apply `RELAYMUX_*` environment variable overrides.
    ///
    /// Supported variables:
    ///  * RELAYMUX_SERVER_PORT, RELAYMUX_SERVER_LOG_LEVEL, RELAYMUX_SERVER_DEBUG_ERRORS
    ///  * RELAYMUX_SERVER_MAX_DISPATCH_ATTEMPTS, RELAYMUX_SERVER_REQUEST_TIMEOUT_SECS
    ///  * RELAYMUX_CREDENTIALS_KEYS (comma separated), RELAYMUX_CREDENTIALS_KEYS_FILE
    ///  * RELAYMUX_UPSTREAM_PROXY, RELAYMUX_UPSTREAM_SYSTEM_PROMPT, RELAYMUX_UPSTREAM_USER_AGENT
    pub fn with_env_vars(mut self) -> Result<Self> {
        tracing::debug!("Loading configuration from environment variables");

        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                self.env_overrides.insert(key, value);
            }
        }

        self.apply_env_overrides()?;

        Ok(self)
    }

    ///
    /// Build and validate the final configuration.
    ///
    /// # Returns
    ///  * `Ok(Config)` - Valid, fully-loaded configuration
    ///  * `Err(ProxyError)` - Configuration validation failed
    pub fn build(self) -> Result<Config> {
        let config = self.build_unchecked()?;
        config.validate()?;

        tracing::info!("Configuration loaded successfully");
        Ok(config)
    }

    ///
    /// Build the configuration without running validation.
    ///
    /// Used by the `validate` command, which reports every issue itself.
    pub fn build_unchecked(self) -> Result<Config> {
        if !self.defaults_applied {
            return Err(ProxyError::Config(
                "Configuration loader must call with_defaults() before build()".to_string(),
            ));
        }

        tracing::debug!(
            "Config: server.port={}, server.log_level={:?}, models={}, redirects={}",
            self.config.server.port,
            self.config.server.log_level,
            self.config.models.len(),
            self.config.redirects.len()
        );

        Ok(self.config)
    }

    /* --- private methods ----------------------------------------------------------------- */

    /// Load and merge configuration from a TOML file
    fn load_config_file(&mut self, path: &Path) -> Result<()> {
        paths::validate_config_file(path)?;

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to read configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let file_config: Config = toml::from_str(&contents).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to parse TOML configuration file '{}': {}\n\
                 \n\
                 Please check the syntax of your configuration file.\n\
                 Common issues:\n\
                 1. Missing quotes around model ids containing dots\n\
                 2. Unknown model `type` (expected anthropic, openai or common)\n\
                 3. Unknown `reasoning` value (expected auto, off, low, medium or high)\n\
                 \n\
                 Run 'relaymux validate' for more details.",
                path.display(),
                e
            ))
        })?;

        self.merge_config(file_config);

        tracing::debug!("Successfully loaded config from: {}", path.display());
        Ok(())
    }

    /// Merge another config into the current config
    fn merge_config(&mut self, other: Config) {
        self.merge_server_config(other.server);
        self.merge_credentials_config(other.credentials);
        self.merge_upstream_config(other.upstream);

        let endpoints = other.endpoints;
        if endpoints.anthropic.is_some() {
            self.config.endpoints.anthropic = endpoints.anthropic;
        }
        if endpoints.openai.is_some() {
            self.config.endpoints.openai = endpoints.openai;
        }
        if endpoints.common.is_some() {
            self.config.endpoints.common = endpoints.common;
        }

        // catalog tables merge entry by entry
        self.config.models.extend(other.models);
        self.config.redirects.extend(other.redirects);
    }

    /// Merge server configuration
    fn merge_server_config(&mut self, other: ServerConfig) {
        let defaults = ServerConfig::default();

        if other.port != defaults.port {
            self.config.server.port = other.port;
        }
        if other.max_dispatch_attempts != defaults.max_dispatch_attempts {
            self.config.server.max_dispatch_attempts = other.max_dispatch_attempts;
        }
        if other.request_timeout_secs != defaults.request_timeout_secs {
            self.config.server.request_timeout_secs = other.request_timeout_secs;
        }

        // an omitted key deserializes to the default, which must not reset an earlier layer
        if other.log_level != defaults.log_level {
            self.config.server.log_level = other.log_level;
        }
        if other.debug_errors != defaults.debug_errors {
            self.config.server.debug_errors = other.debug_errors;
        }
    }

    /// Merge credential configuration; a layer that names any source replaces the sources
    fn merge_credentials_config(&mut self, other: CredentialsConfig) {
        if !other.keys.is_empty() || other.keys_file.is_some() || other.refresh.is_some() {
            self.config.credentials = other;
        }
    }

    /// Merge upstream configuration
    fn merge_upstream_config(&mut self, other: UpstreamConfig) {
        if other.proxy.is_some() {
            self.config.upstream.proxy = other.proxy;
        }
        if !other.proxies.is_empty() {
            self.config.upstream.proxies = other.proxies;
        }
        if other.system_prompt.is_some() {
            self.config.upstream.system_prompt = other.system_prompt;
        }
        if other.user_agent != UpstreamConfig::default().user_agent {
            self.config.upstream.user_agent = other.user_agent;
        }
    }

    /// Apply environment variable overrides to current configuration
    fn apply_env_overrides(&mut self) -> Result<()> {
        for (key, value) in &self.env_overrides {
            match key.as_str() {
                "RELAYMUX_SERVER_PORT" => {
                    self.config.server.port = value.parse().map_err(|e| {
                        ProxyError::Config(format!(
                            "Invalid RELAYMUX_SERVER_PORT value '{}': {}\n\
                             Port must be a number between 1 and 65535.",
                            value, e
                        ))
                    })?;
                }
                "RELAYMUX_SERVER_LOG_LEVEL" => {
                    self.config.server.log_level = LogLevel::parse(value)?;
                }
                "RELAYMUX_SERVER_DEBUG_ERRORS" => {
                    self.config.server.debug_errors = parse_bool_env(value, key)?;
                }
                "RELAYMUX_SERVER_MAX_DISPATCH_ATTEMPTS" => {
                    self.config.server.max_dispatch_attempts = parse_number_env(value, key)?;
                }
                "RELAYMUX_SERVER_REQUEST_TIMEOUT_SECS" => {
                    self.config.server.request_timeout_secs = parse_number_env(value, key)?;
                }

                "RELAYMUX_CREDENTIALS_KEYS" => {
                    self.config.credentials.keys = value
                        .split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "RELAYMUX_CREDENTIALS_KEYS_FILE" => {
                    self.config.credentials.keys_file = Some(value.clone());
                }

                "RELAYMUX_UPSTREAM_PROXY" => {
                    self.config.upstream.proxy = Some(value.clone()).filter(|p| !p.is_empty());
                }
                "RELAYMUX_UPSTREAM_SYSTEM_PROMPT" => {
                    self.config.upstream.system_prompt = Some(value.clone());
                }
                "RELAYMUX_UPSTREAM_USER_AGENT" => {
                    self.config.upstream.user_agent = value.clone();
                }

                _ => {
                    tracing::debug!("Ignoring unknown environment variable: {}", key);
                }
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/* --- utility functions ------------------------------------------------------------------- */

/// Parse boolean value from environment variable
fn parse_bool_env(value: &str, var_name: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" | "enabled" => Ok(true),
        "false" | "no" | "0" | "off" | "disabled" => Ok(false),
        _ => Err(ProxyError::Config(format!(
            "Invalid boolean value for {}: '{}'\n\
             Valid values: true/false, yes/no, 1/0, on/off, enabled/disabled",
            var_name, value
        ))),
    }
}

/// Parse a numeric environment variable
fn parse_number_env<T>(value: &str, var_name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ProxyError::Config(format!("Invalid {} value '{}': {}", var_name, value, e)))
}

/* --- tests ------------------------------------------------------------------------------- */
