//!
//! Resilient dispatcher.
//!
//! Sends one prepared upstream request through the credential pool. A
//! quota/auth-class status (401, 402, 403, 429) rotates the pool and retries
//! with the next credential until every credential has been tried once in
//! this cycle; the last failing response is then returned untouched.
//! Transport failures are surfaced immediately and never retried.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::converter::headers::set_authorization;
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::transport::{OutboundRequest, TransportSelector, Upstream, UpstreamResponse};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Dispatch counters reported by the health endpoint.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /** upstream attempts made, including retries */
    pub attempts: AtomicU64,
    /** quota/auth-class responses received */
    pub quota_errors: AtomicU64,
    /** retries with a rotated credential */
    pub fallback_attempts: AtomicU64,
    /** successful responses obtained after at least one rotation */
    pub fallback_successes: AtomicU64,
    /** dispatches that tried every credential and still failed */
    pub exhausted_cycles: AtomicU64,
    /** transport-level failures */
    pub network_errors: AtomicU64,
}

///
/// Shared dispatch engine; one instance serves every request handler.
pub struct Dispatcher {
    pool: Arc<CredentialPool>,
    transport: Arc<dyn TransportSelector>,
    upstream: Arc<dyn Upstream>,
    /** loop-safety ceiling, independent of the pool size */
    max_attempts: u32,
    metrics: DispatchMetrics,
}

/* --- constants ------------------------------------------------------------------------------ */

/** characters of a failing response body kept in the log line */
const LOGGED_BODY_CHARS: usize = 300;

/* --- start of code -------------------------------------------------------------------------- */

///
/// Whether a status blames the credential rather than the request.
pub fn is_quota_or_auth(status: StatusCode) -> bool {
    matches!(status.as_u16(), 401 | 402 | 403 | 429)
}

impl Dispatcher {
    pub fn new(
        pool: Arc<CredentialPool>,
        transport: Arc<dyn TransportSelector>,
        upstream: Arc<dyn Upstream>,
        max_attempts: u32,
    ) -> Self {
        Self { pool, transport, upstream, max_attempts: max_attempts.max(1), metrics: DispatchMetrics::default() }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    ///
    /// Send a request, failing over across the credential pool.
    ///
    /// # Arguments
    ///  * `request` - prepared request; its Authorization header is rewritten per attempt
    ///
    /// # Returns
    ///  * First response that is not quota/auth-class, or the last failing one
    ///    when no further credential is available
    ///  * `ProxyError::DispatchNetwork` on transport failure
    ///  * `ProxyError::CredentialUnavailable` if no credential could be obtained
    pub async fn dispatch(&self, mut request: OutboundRequest) -> Result<UpstreamResponse> {
        self.pool.start_cycle();
        let mut attempts: u32 = 0;
        let mut rotated = false;

        loop {
            attempts += 1;
            self.metrics.attempts.fetch_add(1, Ordering::Relaxed);

            let credential = self.pool.current().await?;
            set_authorization(&mut request.headers, &credential.secret);
            let route = self.transport.select(&request.url);

            tracing::debug!(
                "Dispatch attempt {} to {} with credential {}/{} ({})",
                attempts,
                request.url,
                credential.index + 1,
                credential.total,
                credential.preview()
            );

            let response = match self.upstream.send(route, &request).await {
                Ok(response) => response,
                Err(e) => {
                    self.metrics.network_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Upstream transport failure, not retrying: {}", e);
                    return Err(e);
                }
            };

            let status = response.status;
            if !is_quota_or_auth(status) {
                if rotated && status.is_success() {
                    self.metrics.fallback_successes.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        "Fallback succeeded with credential {}/{} after {} attempt(s)",
                        credential.index + 1,
                        credential.total,
                        attempts
                    );
                }
                return Ok(response);
            }

            self.metrics.quota_errors.fetch_add(1, Ordering::Relaxed);
            if status == StatusCode::UNAUTHORIZED {
                self.pool.invalidate().await;
            }

            if attempts >= self.max_attempts {
                tracing::warn!("Reached {} dispatch attempt(s), returning upstream {}", attempts, status);
                return Ok(response);
            }

            if self.pool.size() > 1 && self.pool.rotate() {
                self.metrics.fallback_attempts.fetch_add(1, Ordering::Relaxed);
                let detail = response.bytes().await.map(|b| preview_body(&b)).unwrap_or_default();
                tracing::warn!(
                    "Upstream {} with credential {}/{}, rotating: {}",
                    status,
                    credential.index + 1,
                    credential.total,
                    detail
                );
                rotated = true;
                continue;
            }

            if self.pool.size() > 1 {
                self.metrics.exhausted_cycles.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("All {} credential(s) failed, returning upstream {}", self.pool.size(), status);
            } else {
                tracing::warn!("Upstream {} and no fallback credential configured", status);
            }
            return Ok(response);
        }
    }
}

impl DispatchMetrics {
    ///
    /// Counter values as JSON.
    pub fn snapshot(&self) -> Value {
        json!({
            "attempts": self.attempts.load(Ordering::Relaxed),
            "quota_errors": self.quota_errors.load(Ordering::Relaxed),
            "fallback_attempts": self.fallback_attempts.load(Ordering::Relaxed),
            "fallback_successes": self.fallback_successes.load(Ordering::Relaxed),
            "exhausted_cycles": self.exhausted_cycles.load(Ordering::Relaxed),
            "network_errors": self.network_errors.load(Ordering::Relaxed),
        })
    }
}

fn preview_body(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(LOGGED_BODY_CHARS).collect()
}
