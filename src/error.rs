//!
//! Error handling for the relaymux gateway.
//!
//! Defines all error types used throughout the application using thiserror
//! and maps each kind to the HTTP status and stable error type surfaced to clients.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use axum::http::StatusCode;
use thiserror::Error;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Application error types.
///
/// Covers configuration, request transformation, dispatch and stream failures.
/// Uses thiserror for automatic Display and Error trait implementations.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Canonical input was structurally invalid for the target provider family.
    #[error("Transform error ({provider}): invalid or missing field '{field}'")]
    Transform { provider: String, field: String },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Transport-level failure; never retried by the dispatcher.
    #[error("Upstream network error: {0}")]
    DispatchNetwork(String),

    #[error("Stream transform error: {0}")]
    StreamTransform(String),

    #[error("Normalization error: {0}")]
    Normalization(String),

    #[error("No upstream credential available: {0}")]
    CredentialUnavailable(String),
}

/* --- start of code -------------------------------------------------------------------------- */

impl ProxyError {
    ///
    /// Build a transform error for the given provider family and offending field.
    pub fn transform(provider: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Transform { provider: provider.into(), field: field.into() }
    }

    ///
    /// HTTP status code surfaced to the client for this error kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Conversion(_) | ProxyError::InvalidModel(_) => StatusCode::BAD_REQUEST,
            ProxyError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::DispatchNetwork(_) | ProxyError::Request(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Config(_)
            | ProxyError::Auth(_)
            | ProxyError::Http(_)
            | ProxyError::Serialization(_)
            | ProxyError::Transform { .. }
            | ProxyError::StreamTransform(_)
            | ProxyError::Normalization(_)
            | ProxyError::CredentialUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    ///
    /// Stable, client-facing error kind.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::Config(_) => "configuration_error",
            ProxyError::Auth(_) | ProxyError::CredentialUnavailable(_) => "credential_unavailable",
            ProxyError::Http(_) => "internal_error",
            ProxyError::Serialization(_) => "serialization_error",
            ProxyError::Request(_) | ProxyError::DispatchNetwork(_) => "upstream_unreachable",
            ProxyError::Conversion(_) => "invalid_request_error",
            ProxyError::Transform { .. } => "transform_error",
            ProxyError::InvalidModel(_) => "invalid_model",
            ProxyError::ModelNotFound(_) => "model_not_found",
            ProxyError::StreamTransform(_) => "stream_error",
            ProxyError::Normalization(_) => "normalization_error",
        }
    }

    ///
    /// Generic message returned to clients when verbose errors are disabled.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::Conversion(_) => "The request body is not a valid chat completion request.".to_string(),
            ProxyError::InvalidModel(_) => "The 'model' field is missing or invalid.".to_string(),
            ProxyError::ModelNotFound(model) => format!("The model '{}' does not exist.", model),
            ProxyError::Request(_) | ProxyError::DispatchNetwork(_) => {
                "The upstream service could not be reached.".to_string()
            }
            ProxyError::Transform { provider, .. } => {
                format!("The request could not be translated for provider family '{}'.", provider)
            }
            ProxyError::Auth(_) | ProxyError::CredentialUnavailable(_) => {
                "No upstream credential is currently available.".to_string()
            }
            _ => "Internal gateway error.".to_string(),
        }
    }
}

/// Result type alias for cleaner error handling throughout the application
pub type Result<T> = std::result::Result<T, ProxyError>;
