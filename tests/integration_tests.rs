//! Integration tests for relaymux HTTP endpoints
//!
//! Drives the full router with `oneshot` against a scripted upstream: model
//! resolution, request shaping per provider family, stream translation,
//! credential fallback and the error contract.

mod common;

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use serde_json::{Value, json};

use common::{FakeUpstream, Reply, app, app_with, get, post, sse_payloads, test_config};

fn chat(model: &str) -> Value {
    json!({"model": model, "messages": [{"role": "user", "content": "hi"}], "stream": false})
}

fn responses_object() -> Value {
    json!({
        "id": "resp_42",
        "object": "response",
        "created_at": 1_750_000_000,
        "model": "gpt-5.1-2025-11-13",
        "status": "completed",
        "output": [
            {"type": "reasoning", "id": "rs_1", "summary": []},
            {"type": "message", "id": "msg_1", "role": "assistant", "content": [
                {"type": "output_text", "text": "Hello"},
                {"type": "output_text", "text": " there"}
            ]}
        ],
        "usage": {"input_tokens": 4, "output_tokens": 2, "total_tokens": 6}
    })
}

#[tokio::test]
async fn test_redirected_model_is_normalized() {
    let upstream = FakeUpstream::new(vec![Reply::json(200, &responses_object())]);
    let (status, headers, body) = post(app(upstream.clone()), "/v1/chat/completions", &chat("gpt-5.1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], "application/json");
    let completion: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(completion["object"], "chat.completion");
    assert_eq!(completion["id"], "chatcmpl-42");
    assert_eq!(completion["choices"][0]["message"]["content"], "Hello there");
    assert_eq!(completion["usage"]["total_tokens"], 6);

    assert_eq!(upstream.sent_url(0), "https://openai.test/v1/responses");
    let sent = upstream.sent_body(0);
    assert_eq!(sent["model"], "gpt-5.1-2025-11-13");
    assert_eq!(sent["input"][0]["role"], "user");
    assert_eq!(upstream.sent_header(0, "authorization").as_deref(), Some("Bearer sk-primary-0001"));
    assert_eq!(upstream.sent_header(0, "x-relaymux-provider").as_deref(), Some("openai"));
}

#[tokio::test]
async fn test_unparseable_responses_payload_passes_through_raw() {
    let raw = json!({"unexpected": true});
    let upstream = FakeUpstream::new(vec![Reply::json(200, &raw)]);
    let (status, _, body) = post(app(upstream), "/v1/chat/completions", &chat("gpt-5.1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), raw);
}

#[tokio::test]
async fn test_missing_model_is_rejected() {
    let upstream = FakeUpstream::new(Vec::new());
    let (status, _, body) =
        post(app(upstream.clone()), "/v1/chat/completions", &json!({"messages": []})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["type"], "invalid_model");
    assert_eq!(error["error"]["code"], 400);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let upstream = FakeUpstream::new(Vec::new());
    let (status, _, body) = post(app(upstream), "/v1/chat/completions", &chat("no-such-model")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["type"], "model_not_found");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let upstream = FakeUpstream::new(Vec::new());
    let (status, _, body) =
        post(app(upstream), "/v1/chat/completions", &json!({"model": "llama-3", "messages": "nope"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_upstream_failure_status_is_propagated() {
    let failure = json!({"error": {"message": "model overloaded"}});
    let upstream = FakeUpstream::new(vec![Reply::json(503, &failure)]);
    let (status, _, body) = post(app(upstream.clone()), "/v1/chat/completions", &chat("claude-auto")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), failure);
    assert_eq!(upstream.calls(), 1, "server errors are not retried");
}

#[tokio::test]
async fn test_quota_failure_falls_back_to_next_credential() {
    let upstream = FakeUpstream::new(vec![
        Reply::json(429, &json!({"error": "quota"})),
        Reply::json(200, &json!({"id": "chatcmpl-1", "object": "chat.completion", "choices": []})),
    ]);
    let (router, state) = app_with(test_config(), upstream.clone());
    let (status, _, _) = post(router, "/v1/chat/completions", &chat("llama-3")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(upstream.sent_header(0, "authorization").as_deref(), Some("Bearer sk-primary-0001"));
    assert_eq!(upstream.sent_header(1, "authorization").as_deref(), Some("Bearer sk-fallback-0002"));
    assert_eq!(state.dispatcher.pool().cycle().current_index, 1);
}

#[tokio::test]
async fn test_exhausted_pool_returns_last_failure_verbatim() {
    let upstream = FakeUpstream::new(vec![
        Reply::json(429, &json!({"error": "first"})),
        Reply::json(403, &json!({"error": "second"})),
    ]);
    let (status, _, body) = post(app(upstream.clone()), "/v1/chat/completions", &chat("llama-3")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"error": "second"}));
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn test_reasoning_policy_high_sets_thinking_budget() {
    let upstream = FakeUpstream::new(vec![Reply::json(200, &json!({"type": "message"}))]);
    post(app(upstream.clone()), "/v1/chat/completions", &chat("claude-high")).await;

    let sent = upstream.sent_body(0);
    assert_eq!(upstream.sent_url(0), "https://anthropic.test/v1/messages");
    assert_eq!(sent["thinking"]["type"], "enabled");
    assert_eq!(sent["thinking"]["budget_tokens"], 24576);
    assert!(sent["max_tokens"].as_u64().unwrap() > 24576);
    assert_eq!(upstream.sent_header(0, "anthropic-version").as_deref(), Some("2023-06-01"));
}

#[tokio::test]
async fn test_reasoning_policy_off_and_auto() {
    let client_thinking = json!({"type": "enabled", "budget_tokens": 2048});
    let mut request = chat("claude-off");
    request["thinking"] = client_thinking.clone();

    let upstream = FakeUpstream::new(vec![
        Reply::json(200, &json!({"type": "message"})),
        Reply::json(200, &json!({"type": "message"})),
    ]);
    post(app(upstream.clone()), "/v1/chat/completions", &request).await;
    request["model"] = json!("claude-auto");
    post(app(upstream.clone()), "/v1/chat/completions", &request).await;

    assert!(upstream.sent_body(0).get("thinking").is_none());
    assert_eq!(upstream.sent_body(1)["thinking"], client_thinking);
}

#[tokio::test]
async fn test_system_prompt_is_prepended() {
    let mut config = test_config();
    config.upstream.system_prompt = Some("Gateway rules.".to_string());
    let upstream = FakeUpstream::new(vec![Reply::json(200, &json!({"type": "message"}))]);
    let (router, _) = app_with(config, upstream.clone());

    let request = json!({
        "model": "claude-auto",
        "messages": [{"role": "system", "content": "Client rules."}, {"role": "user", "content": "hi"}]
    });
    post(router, "/v1/chat/completions", &request).await;

    let system = &upstream.sent_body(0)["system"];
    assert_eq!(system[0]["text"], "Gateway rules.");
    assert_eq!(system[1]["text"], "Client rules.");
}

#[tokio::test]
async fn test_anthropic_stream_is_translated() {
    let upstream = FakeUpstream::new(vec![Reply::sse(vec![
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":3}}}\n\n".into(),
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi".into(),
        "!\"}}\n\nevent: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":1}}\n\n".into(),
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n".into(),
    ])]);
    let mut request = chat("claude-auto");
    request["stream"] = json!(true);
    let (status, headers, body) = post(app(upstream.clone()), "/v1/chat/completions", &request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], "text/event-stream");
    assert!(body.ends_with(b"data: [DONE]\n\n"));
    assert_eq!(upstream.sent_header(0, "accept").as_deref(), Some("text/event-stream"));

    let chunks = sse_payloads(&body);
    assert!(chunks.iter().all(|c| c["object"] == "chat.completion.chunk"));
    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "Hi!");
    let last = chunks.last().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert_eq!(last["usage"]["total_tokens"], 4);
}

#[tokio::test]
async fn test_common_stream_passes_through() {
    let raw = "data: {\"id\":\"x\",\"object\":\"chat.completion.chunk\",\"choices\":[]}\n\ndata: [DONE]\n\n";
    let upstream = FakeUpstream::new(vec![Reply::sse(vec![raw.to_string()])]);
    let mut request = chat("llama-3");
    request["stream"] = json!(true);
    let (status, _, body) = post(app(upstream.clone()), "/v1/chat/completions", &request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], raw.as_bytes());
    assert_eq!(upstream.sent_url(0), "https://common.test/v1/chat/completions");
}

#[tokio::test]
async fn test_native_messages_endpoint_injects_policy() {
    let upstream = FakeUpstream::new(vec![Reply::json(200, &json!({"type": "message", "content": []}))]);
    let native = json!({
        "model": "claude-high",
        "max_tokens": 64,
        "messages": [{"role": "user", "content": "hi"}]
    });
    let (status, _, body) = post(app(upstream.clone()), "/v1/messages", &native).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["type"], "message");
    let sent = upstream.sent_body(0);
    assert_eq!(sent["thinking"]["budget_tokens"], 24576);
    assert_eq!(sent["messages"][0]["content"], "hi");
}

#[tokio::test]
async fn test_native_endpoint_rejects_other_family() {
    let upstream = FakeUpstream::new(Vec::new());
    let native = json!({"model": "gpt-5.1", "input": "hi"});
    let (status, _, _) = post(app(upstream.clone()), "/v1/messages", &native).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_native_responses_endpoint_resolves_redirect() {
    let upstream = FakeUpstream::new(vec![Reply::json(200, &responses_object())]);
    let native = json!({"model": "gpt-5.1", "input": "hi"});
    let (status, _, body) = post(app(upstream.clone()), "/v1/responses", &native).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["id"], "resp_42");
    assert_eq!(upstream.sent_body(0)["model"], "gpt-5.1-2025-11-13");
}

#[tokio::test]
async fn test_models_endpoint_lists_catalog_and_redirects() {
    let (status, _, body) = get(app(FakeUpstream::new(Vec::new())), "/v1/models").await;

    assert_eq!(status, StatusCode::OK);
    let listing: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listing["object"], "list");
    let ids: Vec<&str> = listing["data"].as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"claude-high"));
    assert!(ids.contains(&"gpt-5.1"));
    assert!(ids.contains(&"gpt-5.1-2025-11-13"));
}

#[tokio::test]
async fn test_health_reports_metrics() {
    let upstream = FakeUpstream::new(vec![Reply::json(200, &json!({"choices": []}))]);
    let (router, _) = app_with(test_config(), upstream);
    post(router.clone(), "/v1/chat/completions", &chat("llama-3")).await;
    post(router.clone(), "/v1/chat/completions", &chat("missing")).await;

    let (status, _, body) = get(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["credentials"]["total"], 2);
    assert_eq!(health["metrics"]["total_requests"], 2);
    assert_eq!(health["metrics"]["successful_requests"], 1);
    assert_eq!(health["metrics"]["failed_requests"], 1);
    assert_eq!(health["metrics"]["dispatch"]["attempts"], 1);
}

#[tokio::test]
async fn test_error_detail_only_in_debug_mode() {
    let mut config = test_config();
    config.server.debug_errors = true;
    let (router, _) = app_with(config, FakeUpstream::new(Vec::new()));

    let (_, _, body) = post(router, "/v1/chat/completions", &json!({"model": "llama-3", "messages": 5})).await;
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"]["message"].as_str().unwrap().starts_with("Conversion error"));

    let (_, _, body) = post(
        app(FakeUpstream::new(Vec::new())),
        "/v1/chat/completions",
        &json!({"model": "llama-3", "messages": 5}),
    )
    .await;
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert!(!error["error"]["message"].as_str().unwrap().contains("invalid type"));
}

#[tokio::test]
async fn test_stream_error_frame_hides_detail_unless_debugging() {
    let malformed = || {
        Reply::sse(vec![
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\"}}\n\n"
                .to_string(),
        ])
    };
    let mut request = chat("claude-auto");
    request["stream"] = json!(true);

    let (status, _, body) = post(app(FakeUpstream::new(vec![malformed()])), "/v1/chat/completions", &request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.ends_with(b"data: [DONE]\n\n"));
    let chunks = sse_payloads(&body);
    assert_eq!(chunks[0]["error"]["type"], "stream_error");
    assert_eq!(chunks[0]["error"]["message"], "upstream stream could not be translated");
    assert!(!String::from_utf8_lossy(&body).contains("missing field"));

    let mut config = test_config();
    config.server.debug_errors = true;
    let (router, _) = app_with(config, FakeUpstream::new(vec![malformed()]));
    let (_, _, body) = post(router, "/v1/chat/completions", &request).await;
    let chunks = sse_payloads(&body);
    assert!(chunks[0]["error"]["message"].as_str().unwrap().contains("missing field"));
}
