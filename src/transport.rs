//!
//! Outbound transport: route selection and the upstream sender seam.
//!
//! [TransportSelector] picks the HTTP client (direct or through a forward
//! proxy) for a target URL. [Upstream] performs one HTTP exchange and hands
//! back the status, headers and an unconsumed body stream, so the dispatcher
//! can decide whether to read the body or pass it on untouched.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;

use crate::config::Config;
use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

/// Upstream response body, read lazily
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

///
/// Fully prepared upstream request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HeaderMap,
    /** serialized vendor body */
    pub body: Bytes,
}

///
/// Upstream answer with a body that has not been read yet.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

///
/// Chooses the transport route for a target URL.
pub trait TransportSelector: Send + Sync {
    ///
    /// Client to use for `url`; `None` means the sender's default client.
    fn select(&self, url: &str) -> Option<Client>;
}

///
/// Sends one request upstream.
#[async_trait]
pub trait Upstream: Send + Sync {
    ///
    /// Perform the HTTP exchange.
    ///
    /// # Arguments
    ///  * `route` - client chosen by the transport selector, if any
    ///  * `request` - prepared request
    ///
    /// # Returns
    ///  * Response with its body still unread, whatever the status
    ///  * `ProxyError::DispatchNetwork` if no HTTP response was obtained
    async fn send(&self, route: Option<Client>, request: &OutboundRequest) -> Result<UpstreamResponse>;
}

///
/// Round-robin over configured forward proxies (`upstream.proxy` plus
/// `upstream.proxies`); direct when none is configured.
#[derive(Debug, Default)]
pub struct ProxyRotation {
    clients: Vec<Client>,
    next: AtomicUsize,
}

///
/// [Upstream] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    /** client used when the selector returns no route */
    client: Client,
}

/* --- start of code -------------------------------------------------------------------------- */

///
/// Create the default outbound HTTP client.
///
/// # Arguments
///  * `config` - supplies the request timeout
///  * `proxy` - optional forward proxy URL
///
/// # Returns
///  * Configured HTTP client
///  * `ProxyError::Http` if client creation fails
pub fn create_http_client(config: &Config, proxy: Option<&str>) -> Result<Client> {
    let mut builder =
        Client::builder().timeout(Duration::from_secs(config.server.request_timeout_secs));

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| ProxyError::Http(format!("Invalid proxy '{}': {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| ProxyError::Http(format!("Failed to create HTTP client: {}", e)))
}

impl ProxyRotation {
    ///
    /// Build one client per configured proxy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let clients = config
            .upstream
            .proxy_urls()
            .into_iter()
            .map(|p| create_http_client(config, Some(p)))
            .collect::<Result<Vec<_>>>()?;

        if !clients.is_empty() {
            tracing::info!("Routing upstream traffic through {} forward proxy(ies)", clients.len());
        }
        Ok(Self { clients, next: AtomicUsize::new(0) })
    }
}

impl TransportSelector for ProxyRotation {
    fn select(&self, url: &str) -> Option<Client> {
        if self.clients.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        tracing::trace!("Selected proxy route {} for {}", i, url);
        Some(self.clients[i].clone())
    }
}

impl ReqwestUpstream {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn send(&self, route: Option<Client>, request: &OutboundRequest) -> Result<UpstreamResponse> {
        let client = route.unwrap_or_else(|| self.client.clone());

        let response = client
            .post(&request.url)
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| ProxyError::DispatchNetwork(format!("{}: {}", request.url, e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map(|chunk| chunk.map_err(ProxyError::from)).boxed();

        Ok(UpstreamResponse { status, headers, body })
    }
}

impl UpstreamResponse {
    ///
    /// Response with an in-memory body.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self { status, headers, body: futures::stream::once(async move { Ok(body) }).boxed() }
    }

    ///
    /// Read the whole body.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut collected = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(collected.freeze())
    }

    /// Content type reported upstream
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
