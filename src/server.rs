//!
//! HTTP request handlers for the relaymux gateway.
//!
//! Binds the catalog, request transformers, dispatcher, streaming transformers
//! and normalizer together per endpoint. Every error path terminates the client
//! connection: a JSON error body before streaming starts, an in-band SSE error
//! frame plus `data: [DONE]` once it has.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::Config;
use crate::converter::canonical::CanonicalFrame;
use crate::converter::headers::{HeaderParams, build_headers};
use crate::converter::{CanonicalRequest, RequestPolicy, build_vendor_body, transformer_for};
use crate::credentials::CredentialPool;
use crate::dispatcher::Dispatcher;
use crate::error::{ProxyError, Result};
use crate::normalizer::normalize_responses;
use crate::provider::{ConfigCatalog, Endpoint, ModelCatalog, ProviderFamily};
use crate::stream::{self, StreamTransformer};
use crate::transport::{
    ByteStream, OutboundRequest, ProxyRotation, ReqwestUpstream, TransportSelector, Upstream,
    UpstreamResponse, create_http_client,
};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Application state shared by every handler.
pub struct AppState {
    /** application configuration */
    pub config: Arc<Config>,
    /** model, endpoint and policy lookup */
    pub catalog: Arc<dyn ModelCatalog>,
    /** resilient dispatcher over the credential pool */
    pub dispatcher: Dispatcher,
    /** request counters for monitoring */
    pub metrics: AppMetrics,
}

///
/// Request-level metrics.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /** total number of requests processed */
    pub total_requests: AtomicU64,
    /** requests answered with a 2xx status */
    pub successful_requests: AtomicU64,
    /** requests answered with an error or upstream failure status */
    pub failed_requests: AtomicU64,
    /** requests answered with a canonical SSE stream */
    pub streaming_requests: AtomicU64,
}

///
/// Where one request goes upstream.
#[derive(Debug, Clone)]
struct Route {
    model_id: String,
    family: ProviderFamily,
    provider: String,
    endpoint: Endpoint,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Channel buffer size for streaming responses */
const STREAMING_CHANNEL_BUFFER: usize = 100;

/** Content type of SSE responses */
const CONTENT_TYPE_SSE: &str = "text/event-stream";

/* --- start of code -------------------------------------------------------------------------- */

impl AppState {
    ///
    /// Create application state with production collaborators.
    ///
    /// # Arguments
    ///  * `config` - validated application configuration
    ///
    /// # Returns
    ///  * Application state
    ///  * `ProxyError` if the HTTP client or credential pool cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let client = create_http_client(&config, None)?;
        let pool = CredentialPool::from_config(&config, client.clone())?;
        let transport = ProxyRotation::from_config(&config)?;

        Ok(Self::with_parts(
            config.clone(),
            Arc::new(ConfigCatalog::new(config)),
            pool,
            Arc::new(transport),
            Arc::new(ReqwestUpstream::new(client)),
        ))
    }

    ///
    /// Assemble state from explicit collaborators.
    pub fn with_parts(
        config: Arc<Config>,
        catalog: Arc<dyn ModelCatalog>,
        pool: CredentialPool,
        transport: Arc<dyn TransportSelector>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        let dispatcher =
            Dispatcher::new(Arc::new(pool), transport, upstream, config.server.max_dispatch_attempts);
        Self { config, catalog, dispatcher, metrics: AppMetrics::default() }
    }

    /// Policy injected into requests for `model_id`
    fn policy_for(&self, model_id: &str) -> RequestPolicy {
        RequestPolicy {
            system_prompt: self.catalog.system_prompt(),
            reasoning: self.catalog.reasoning_policy(model_id),
        }
    }

    fn record(&self, response: &Response) {
        let counter = if response.status().is_success() {
            &self.metrics.successful_requests
        } else {
            &self.metrics.failed_requests
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

///
/// Handle the canonical chat completions endpoint.
///
/// # Arguments
///  * `state` - shared application state
///  * `headers` - client headers, a few diagnostic ones are forwarded
///  * `body` - canonical request JSON
///
/// # Returns
///  * Canonical completion, canonical SSE stream, or the upstream failure verbatim
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

    let response = match process_chat_completion(&state, &headers, &body).await {
        Ok(response) => response,
        Err(e) => create_error_response(&e, state.config.server.debug_errors),
    };
    state.record(&response);
    response
}

///
/// Handle the native Anthropic messages endpoint (policy injection only).
pub async fn messages(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    native_passthrough(state, headers, body, ProviderFamily::Anthropic).await
}

///
/// Handle the native OpenAI responses endpoint (policy injection only).
pub async fn responses(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    native_passthrough(state, headers, body, ProviderFamily::OpenAi).await
}

async fn native_passthrough(
    state: Arc<AppState>,
    headers: HeaderMap,
    body: Bytes,
    family: ProviderFamily,
) -> Response {
    state.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

    let response = match process_native(&state, &headers, &body, family).await {
        Ok(response) => response,
        Err(e) => create_error_response(&e, state.config.server.debug_errors),
    };
    state.record(&response);
    response
}

///
/// Process a canonical chat completion end-to-end.
async fn process_chat_completion(state: &Arc<AppState>, headers: &HeaderMap, body: &[u8]) -> Result<Response> {
    let request: CanonicalRequest = serde_json::from_slice(body)
        .map_err(|e| ProxyError::Conversion(format!("Invalid request format: {}", e)))?;
    log_incoming_request(&request);

    let route = resolve_route(state, request.model.as_deref())?;
    let policy = state.policy_for(&route.model_id);
    let vendor_body = build_vendor_body(route.family, &request, &route.model_id, &policy)?;
    let streaming = request.is_streaming();

    let response = send_upstream(state, headers, &route, &vendor_body, streaming).await?;
    if !response.status.is_success() {
        tracing::warn!("Upstream answered {} for model {}", response.status, route.model_id);
        return Ok(passthrough_response(response));
    }

    if streaming {
        return Ok(match stream::transformer_for(route.family, &route.model_id) {
            Some(transformer) => {
                state.metrics.streaming_requests.fetch_add(1, Ordering::Relaxed);
                canonical_stream_response(response, transformer, state.config.server.debug_errors)
            }
            None => passthrough_response(response),
        });
    }

    match route.family {
        ProviderFamily::OpenAi => normalized_response(response, &route.model_id).await,
        ProviderFamily::Anthropic | ProviderFamily::Common => Ok(passthrough_response(response)),
    }
}

///
/// Forward a native vendor body with policy injected.
async fn process_native(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    body: &[u8],
    family: ProviderFamily,
) -> Result<Response> {
    let mut payload: Value = serde_json::from_slice(body)
        .map_err(|e| ProxyError::Conversion(format!("Invalid request format: {}", e)))?;
    if !payload.is_object() {
        return Err(ProxyError::Conversion("Request body must be a JSON object".to_string()));
    }

    let route = resolve_route(state, payload.get("model").and_then(Value::as_str))?;
    if route.family != family {
        return Err(ProxyError::InvalidModel(format!(
            "Model '{}' is served over the {} protocol, not {}",
            route.model_id, route.family, family
        )));
    }

    payload["model"] = json!(route.model_id);
    transformer_for(family).apply_policy(&mut payload, &state.policy_for(&route.model_id));
    let streaming = payload.get("stream").and_then(Value::as_bool).unwrap_or(false);

    let response = send_upstream(state, headers, &route, &payload, streaming).await?;
    Ok(passthrough_response(response))
}

///
/// Resolve the client model id to model, family and endpoint.
///
/// # Returns
///  * Route for the request
///  * `ProxyError::InvalidModel` if the id is missing or blank
///  * `ProxyError::ModelNotFound` if the catalog does not know it
///  * `ProxyError::Config` if no endpoint serves the model's family
fn resolve_route(state: &AppState, raw_model: Option<&str>) -> Result<Route> {
    let raw = raw_model
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ProxyError::InvalidModel("missing 'model' field".to_string()))?;

    let model_id =
        state.catalog.resolve_model(raw).ok_or_else(|| ProxyError::ModelNotFound(raw.to_string()))?;
    let info = state.catalog.get_model(&model_id).ok_or_else(|| ProxyError::ModelNotFound(raw.to_string()))?;
    let endpoint = state.catalog.get_endpoint(info.family).ok_or_else(|| {
        ProxyError::Config(format!("No endpoint configured for provider family '{}'", info.family))
    })?;

    if raw != model_id {
        tracing::debug!("Model '{}' redirected to '{}'", raw, model_id);
    }
    Ok(Route { model_id, family: info.family, provider: info.provider, endpoint })
}

///
/// Build headers and body, then dispatch through the credential pool.
async fn send_upstream(
    state: &AppState,
    client_headers: &HeaderMap,
    route: &Route,
    body: &Value,
    streaming: bool,
) -> Result<UpstreamResponse> {
    let credential = state.dispatcher.pool().current().await?;
    let headers = build_headers(&HeaderParams {
        credential: &credential,
        client_headers,
        is_streaming: streaming,
        model_id: &route.model_id,
        provider: &route.provider,
        family: route.family,
        user_agent: &state.config.upstream.user_agent,
    });

    let request = OutboundRequest {
        url: route.endpoint.url(),
        headers,
        body: Bytes::from(serde_json::to_vec(body)?),
    };
    tracing::debug!("Sending {} request for {} to {}", route.family, route.model_id, request.url);

    state.dispatcher.dispatch(request).await
}

fn log_incoming_request(request: &CanonicalRequest) {
    tracing::debug!("=== Incoming chat completion ===");
    tracing::debug!("Model: {:?}", request.model);
    tracing::debug!("Stream: {:?}", request.stream);
    tracing::debug!("Messages: {}", request.messages.len());

    if let Some(ref tools) = request.tools {
        let tool_names: Vec<&str> = tools.iter().map(|t| t.function.name.as_str()).collect();
        tracing::debug!("Tools provided: {} ({})", tools.len(), tool_names.join(", "));
    }
}

///
/// Normalize a responses object, falling back to the raw payload.
async fn normalized_response(response: UpstreamResponse, model_id: &str) -> Result<Response> {
    let status = response.status;
    let content_type = response.headers.get(CONTENT_TYPE).cloned();
    let raw = response.bytes().await?;

    let normalized = serde_json::from_slice::<Value>(&raw)
        .map_err(ProxyError::from)
        .and_then(|payload| normalize_responses(&payload, model_id));

    match normalized {
        Ok(completion) => Ok((status, Json(completion)).into_response()),
        Err(e) => {
            tracing::warn!("Returning raw upstream payload, normalization failed: {}", e);
            Ok(raw_response(status, content_type, Body::from(raw)))
        }
    }
}

///
/// Upstream status, content type and body, forwarded byte for byte.
fn passthrough_response(response: UpstreamResponse) -> Response {
    let content_type = response.headers.get(CONTENT_TYPE).cloned();
    raw_response(response.status, content_type, Body::from_stream(response.body))
}

fn raw_response(status: StatusCode, content_type: Option<HeaderValue>, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

///
/// Stream the upstream body through a canonical transformer.
///
/// The transform runs in its own task; a closed channel means the client went
/// away, and the task then drops the upstream body to release the connection.
fn canonical_stream_response(
    response: UpstreamResponse,
    transformer: Box<dyn StreamTransformer>,
    debug_errors: bool,
) -> Response {
    let (tx, rx) = mpsc::channel::<Bytes>(STREAMING_CHANNEL_BUFFER);

    tokio::spawn(async move {
        pump_stream(response.body, transformer, tx, debug_errors).await;
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<Bytes, Infallible>));
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_SSE));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

///
/// Drive one stream to completion.
///
/// # Arguments
///  * `body` - upstream SSE body
///  * `transformer` - per-request vendor transformer
///  * `tx` - client body channel
///  * `debug_errors` - send internal error detail in error frames
async fn pump_stream(
    mut body: ByteStream,
    mut transformer: Box<dyn StreamTransformer>,
    tx: mpsc::Sender<Bytes>,
    debug_errors: bool,
) {
    loop {
        // a stalled upstream must not outlive the client
        let next = tokio::select! {
            next = body.next() => next,
            _ = tx.closed() => {
                tracing::debug!("Client disconnected while waiting on upstream, dropping upstream stream");
                return;
            }
        };
        let Some(chunk) = next else { break };

        let frames = match chunk {
            Ok(bytes) => transformer.push(&bytes),
            Err(e) => {
                let err = ProxyError::StreamTransform(format!("upstream stream broke: {}", e));
                transformer.fail(&err.to_string())
            }
        };

        if !send_frames(&tx, frames, debug_errors).await {
            tracing::debug!("Client disconnected, dropping upstream stream");
            return;
        }
        if transformer.is_complete() {
            return;
        }
    }

    send_frames(&tx, transformer.finish(), debug_errors).await;
}

///
/// Write frames to the client.
///
/// # Returns
///  * `false` once the client has gone away
async fn send_frames(tx: &mpsc::Sender<Bytes>, frames: Vec<CanonicalFrame>, debug_errors: bool) -> bool {
    for frame in frames {
        if tx.send(frame.encode(debug_errors)).await.is_err() {
            return false;
        }
    }
    true
}

///
/// Create an error response.
///
/// Full detail is logged; clients see a stable message unless `debug_errors` is set.
///
/// # Arguments
///  * `error` - error to convert to HTTP response
///  * `debug_errors` - echo the internal message
///
/// # Returns
///  * HTTP error response with JSON error details
fn create_error_response(error: &ProxyError, debug_errors: bool) -> Response {
    let status_code = error.status_code();
    if status_code.is_server_error() {
        tracing::error!("Request failed: {}", error);
    } else {
        tracing::warn!("Request rejected: {}", error);
    }

    let message = if debug_errors { error.to_string() } else { error.public_message() };
    let error_response = json!({
      "error": {
        "message": message,
        "type": error.error_type(),
        "code": status_code.as_u16()
      }
    });

    (status_code, Json(error_response)).into_response()
}

///
/// Handle models listing endpoint.
///
/// # Arguments
///  * `state` - shared application state
///
/// # Returns
///  * JSON list of catalog models and redirect aliases
pub async fn models(State(state): State<Arc<AppState>>) -> Json<Value> {
    let created = chrono::Utc::now().timestamp();
    let data: Vec<Value> = state
        .catalog
        .list_models()
        .into_iter()
        .map(|m| {
            let mut entry = json!({
                "id": m.id,
                "object": "model",
                "created": created,
                "owned_by": m.owned_by,
            });
            if let Some(name) = m.display_name {
                entry["display_name"] = json!(name);
            }
            entry
        })
        .collect();

    Json(json!({ "object": "list", "data": data }))
}

///
/// Handle health check endpoint.
///
/// # Arguments
///  * `state` - shared application state with metrics
///
/// # Returns
///  * JSON response with health status, credential position and metrics
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let total_requests = state.metrics.total_requests.load(Ordering::Relaxed);
    let successful_requests = state.metrics.successful_requests.load(Ordering::Relaxed);
    let failed_requests = state.metrics.failed_requests.load(Ordering::Relaxed);
    let pool = state.dispatcher.pool();
    let cycle = pool.cycle();

    Json(json!({
      "status": "ok",
      "credentials": {
        "total": pool.size(),
        "current_index": cycle.current_index,
        "refreshable": pool.is_refreshable()
      },
      "metrics": {
        "total_requests": total_requests,
        "successful_requests": successful_requests,
        "failed_requests": failed_requests,
        "streaming_requests": state.metrics.streaming_requests.load(Ordering::Relaxed),
        "dispatch": state.dispatcher.metrics().snapshot(),
        "success_rate": if total_requests > 0 {
          (successful_requests as f64 / total_requests as f64 * 100.0).round()
        } else {
          100.0
        }
      }
    }))
}
