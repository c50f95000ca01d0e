//! Shared fixtures for the HTTP-level tests.
//!
//! `FakeUpstream` answers from a scripted queue and records every request it
//! receives, so the tests can drive the whole router with `oneshot` and no
//! network.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

use relaymux::config::{Config, EndpointConfig, ModelConfig};
use relaymux::converter::ReasoningPolicy;
use relaymux::credentials::CredentialPool;
use relaymux::error::Result;
use relaymux::provider::{ConfigCatalog, ProviderFamily};
use relaymux::transport::{OutboundRequest, ProxyRotation, Upstream, UpstreamResponse};
use relaymux::{AppState, create_router};

/// One scripted upstream answer
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    /** body chunks, delivered in order */
    pub chunks: Vec<String>,
}

impl Reply {
    pub fn json(status: u16, body: &Value) -> Self {
        Self { status, content_type: "application/json", chunks: vec![body.to_string()] }
    }

    pub fn sse(chunks: Vec<String>) -> Self {
        Self { status: 200, content_type: "text/event-stream", chunks }
    }
}

#[derive(Default)]
pub struct FakeUpstream {
    replies: Mutex<Vec<Reply>>,
    pub seen: Mutex<Vec<OutboundRequest>>,
}

impl FakeUpstream {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies), seen: Mutex::new(Vec::new()) })
    }

    /// Body of the n-th recorded request as JSON
    pub fn sent_body(&self, n: usize) -> Value {
        serde_json::from_slice(&self.seen.lock().unwrap()[n].body).unwrap()
    }

    pub fn sent_url(&self, n: usize) -> String {
        self.seen.lock().unwrap()[n].url.clone()
    }

    pub fn sent_header(&self, n: usize, name: &str) -> Option<String> {
        self.seen.lock().unwrap()[n].headers.get(name).map(|v| v.to_str().unwrap().to_string())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn send(&self, _route: Option<reqwest::Client>, request: &OutboundRequest) -> Result<UpstreamResponse> {
        self.seen.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().remove(0);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(reply.content_type));
        let body = futures::stream::iter(reply.chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed();

        Ok(UpstreamResponse { status: StatusCode::from_u16(reply.status).unwrap(), headers, body })
    }
}

fn model(family: ProviderFamily, reasoning: ReasoningPolicy) -> ModelConfig {
    ModelConfig { family, provider: None, reasoning, display_name: None }
}

fn endpoint(base_url: &str) -> Option<EndpointConfig> {
    Some(EndpointConfig { base_url: base_url.to_string(), path: None })
}

/// Catalog with one model per family and reasoning policy
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.credentials.keys = vec!["sk-primary-0001".to_string(), "sk-fallback-0002".to_string()];
    config.endpoints.anthropic = endpoint("https://anthropic.test");
    config.endpoints.openai = endpoint("https://openai.test/");
    config.endpoints.common = endpoint("https://common.test");

    config.models.insert("claude-high".into(), model(ProviderFamily::Anthropic, ReasoningPolicy::High));
    config.models.insert("claude-off".into(), model(ProviderFamily::Anthropic, ReasoningPolicy::Off));
    config.models.insert("claude-auto".into(), model(ProviderFamily::Anthropic, ReasoningPolicy::Auto));
    config.models.insert("gpt-5.1-2025-11-13".into(), model(ProviderFamily::OpenAi, ReasoningPolicy::Auto));
    config.models.insert("llama-3".into(), model(ProviderFamily::Common, ReasoningPolicy::Auto));
    config.redirects.insert("gpt-5.1".into(), "gpt-5.1-2025-11-13".into());
    config
}

pub fn app_with(config: Config, upstream: Arc<FakeUpstream>) -> (Router, Arc<AppState>) {
    let config = Arc::new(config);
    let pool = CredentialPool::from_keys(config.load_credential_keys().unwrap()).unwrap();
    let state = Arc::new(AppState::with_parts(
        config.clone(),
        Arc::new(ConfigCatalog::new(config)),
        pool,
        Arc::new(ProxyRotation::default()),
        upstream,
    ));
    (create_router(state.clone()), state)
}

pub fn app(upstream: Arc<FakeUpstream>) -> Router {
    app_with(test_config(), upstream).0
}

pub async fn post(app: Router, path: &str, body: &Value) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get(app: Router, path: &str) -> (StatusCode, HeaderMap, Bytes) {
    send(app, Request::builder().uri(path).body(Body::empty()).unwrap()).await
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

/// JSON payloads of the `data:` frames in a canonical SSE body, `[DONE]` excluded
pub fn sse_payloads(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .filter(|data| *data != "[DONE]")
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}
