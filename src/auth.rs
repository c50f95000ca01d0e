//!
//! Refreshable upstream token source.
//!
//! When the gateway runs on a single refreshable token instead of a key list,
//! the credential pool asks a [TokenRefresher] for a new secret whenever the
//! cached one is stale. [HttpTokenRefresher] exchanges a long-lived refresh
//! token at a configured HTTP endpoint.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::RefreshConfig;
use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Freshly exchanged token.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub secret: String,
    /** lifetime reported by the exchange endpoint, if any */
    pub expires_in: Option<Duration>,
}

///
/// Collaborator that produces a new upstream secret on demand.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    ///
    /// Exchange for a new token.
    ///
    /// # Returns
    ///  * Fresh token
    ///  * `ProxyError::Auth` if the exchange fails
    async fn refresh(&self) -> Result<RefreshedToken>;
}

///
/// Token exchange over HTTP: `POST {url}` with `{"refresh_token": ...}`.
pub struct HttpTokenRefresher {
    /** HTTP client shared with the rest of the gateway */
    client: Client,
    url: String,
    refresh_token: String,
}

/// Accepted response shapes: `{"token": ..}` or `{"access_token": .., "expires_in": n}`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/* --- start of code -------------------------------------------------------------------------- */

impl HttpTokenRefresher {
    ///
    /// Create a refresher for the configured exchange endpoint.
    pub fn new(client: Client, config: &RefreshConfig) -> Self {
        Self { client, url: config.url.clone(), refresh_token: config.refresh_token.clone() }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> Result<RefreshedToken> {
        tracing::debug!("Refreshing upstream token at {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "refresh_token": self.refresh_token }))
            .send()
            .await
            .map_err(|e| ProxyError::Auth(format!("Token exchange request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Auth(format!(
                "Token exchange returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::Auth(format!("Token exchange response invalid: {}", e)))?;

        if parsed.token.trim().is_empty() {
            return Err(ProxyError::Auth("Token exchange returned an empty token".to_string()));
        }

        Ok(RefreshedToken {
            secret: parsed.token,
            expires_in: parsed.expires_in.map(Duration::from_secs),
        })
    }
}
