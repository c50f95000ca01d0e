//! # relaymux - OpenAI-compatible gateway library
//!
//! One chat-completions API in front of Anthropic messages, OpenAI responses
//! and plain chat-completions upstreams. Requests are reshaped per provider
//! family, streamed answers are translated back into canonical SSE chunks,
//! and quota or auth failures rotate through an ordered credential pool.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use relaymux::{Config, create_app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let app = create_app(config)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Layered TOML configuration, catalog and validation
//! - [`provider`] - Model catalog, redirects and provider families
//! - [`converter`] - Canonical request model and per-family request transformers
//! - [`credentials`] - Ordered credential pool with rotation cycle
//! - [`auth`] - Refreshable token exchange
//! - [`transport`] - Outbound HTTP client, proxy routes and the upstream seam
//! - [`dispatcher`] - Resilient dispatch with credential fallback
//! - [`stream`] - SSE parsing and vendor-to-canonical stream transformers
//! - [`normalizer`] - Non-streaming responses normalization
//! - [`server`] - HTTP handlers
//! - [`error`] - Error types and handling

pub mod auth;
pub mod config;
pub mod converter;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod normalizer;
pub mod provider;
pub mod server;
pub mod stream;
pub mod transport;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// Re-export commonly used types
pub use config::{Config, ValidationIssue, ValidationSeverity};
pub use error::ProxyError;
pub use server::AppState;

/// Creates a new relaymux application with the given configuration.
///
/// Builds the HTTP client, credential pool and transport routes, then wires
/// the router.
///
/// # Arguments
///
/// * `config` - Validated application configuration
///
/// # Errors
///
/// Returns a `ProxyError` if the credential pool or HTTP client cannot be built.
pub fn create_app(config: Config) -> Result<Router, ProxyError> {
    let app_state = Arc::new(AppState::new(config)?);
    Ok(create_router(app_state))
}

/// Creates the router over prepared application state.
///
/// Routes: `POST /v1/chat/completions`, `POST /v1/messages`, `POST /v1/responses`,
/// `GET /v1/models` and `GET /health`.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(server::chat_completions))
        .route("/v1/messages", post(server::messages))
        .route("/v1/responses", post(server::responses))
        .route("/v1/models", get(server::models))
        .route("/health", get(server::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
