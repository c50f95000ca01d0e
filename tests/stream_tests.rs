//! Streaming translation and normalization tests
//!
//! Exercises the vendor stream transformers through their public interface:
//! chunking independence, tool-call reconstruction, termination guarantees,
//! and the non-streaming normalizer.

use serde_json::{Value, json};

use relaymux::normalizer::normalize_responses;
use relaymux::provider::ProviderFamily;
use relaymux::stream::{StreamTransformer, transformer_for};

const RESPONSES_STREAM: &str = concat!(
    "event: response.created\n",
    "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_1\"}}\n\n",
    "event: response.reasoning_summary_text.delta\n",
    "data: {\"type\":\"response.reasoning_summary_text.delta\",\"delta\":\"thinking…\"}\n\n",
    "event: response.output_text.delta\n",
    "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Zażółć \"}\n\n",
    "event: response.output_text.delta\n",
    "data: {\"type\":\"response.output_text.delta\",\"delta\":\"gęślą jaźń\"}\n\n",
    ": keep-alive\n\n",
    "event: response.output_item.added\n",
    "data: {\"type\":\"response.output_item.added\",\"item\":{\"type\":\"function_call\",\"id\":\"fc_1\",\"call_id\":\"call_1\",\"name\":\"lookup\",\"arguments\":\"\"}}\n\n",
    "event: response.function_call_arguments.delta\n",
    "data: {\"type\":\"response.function_call_arguments.delta\",\"item_id\":\"fc_1\",\"delta\":\"{\\\"q\\\":\"}\n\n",
    "event: response.function_call_arguments.delta\n",
    "data: {\"type\":\"response.function_call_arguments.delta\",\"item_id\":\"fc_1\",\"delta\":\"\\\"cat\\\"}\"}\n\n",
    "event: response.output_item.done\n",
    "data: {\"type\":\"response.output_item.done\",\"item\":{\"type\":\"function_call\",\"id\":\"fc_1\",\"call_id\":\"call_1\",\"name\":\"lookup\",\"arguments\":\"{\\\"q\\\":\\\"cat\\\"}\"}}\n\n",
    "event: response.completed\n",
    "data: {\"type\":\"response.completed\",\"response\":{\"usage\":{\"input_tokens\":9,\"output_tokens\":5,\"total_tokens\":14}}}\n\n",
);

const ANTHROPIC_STREAM: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"usage\":{\"input_tokens\":9}}}\n\n",
    "event: content_block_start\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"thinking\",\"thinking\":\"\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"hmm\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"text_delta\",\"text\":\"Żółw \"}}\n\n",
    "event: content_block_start\n",
    "data: {\"type\":\"content_block_start\",\"index\":2,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"lookup\",\"input\":{}}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":2,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"q\\\":\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":2,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"\\\"cat\\\"}\"}}\n\n",
    "event: content_block_stop\n",
    "data: {\"type\":\"content_block_stop\",\"index\":2}\n\n",
    "event: message_delta\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":{\"output_tokens\":5}}\n\n",
    "event: message_stop\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

/// Feed `input` in chunks of `size` bytes and return the canonical SSE output
fn run_chunked(family: ProviderFamily, input: &[u8], size: usize) -> String {
    let mut transformer = transformer_for(family, "test-model").unwrap();
    let mut frames = Vec::new();
    for chunk in input.chunks(size) {
        frames.extend(transformer.push(chunk));
        if transformer.is_complete() {
            break;
        }
    }
    if !transformer.is_complete() {
        frames.extend(transformer.finish());
    }
    frames.iter().map(|f| String::from_utf8(f.to_sse().to_vec()).unwrap()).collect()
}

/// Chunk payloads with the per-stream id and timestamp removed
fn comparable(output: &str) -> Vec<Value> {
    output
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| match serde_json::from_str::<Value>(data) {
            Ok(mut value) => {
                if let Some(obj) = value.as_object_mut() {
                    obj.remove("id");
                    obj.remove("created");
                }
                value
            }
            Err(_) => Value::String(data.to_string()),
        })
        .collect()
}

fn tool_calls(output: &str) -> Vec<Value> {
    comparable(output)
        .into_iter()
        .filter_map(|chunk| chunk["choices"][0]["delta"]["tool_calls"].as_array().cloned())
        .flatten()
        .collect()
}

fn content(output: &str) -> String {
    comparable(output)
        .iter()
        .filter_map(|chunk| chunk["choices"][0]["delta"]["content"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn test_chunking_does_not_change_output() {
    for (family, input) in [
        (ProviderFamily::OpenAi, RESPONSES_STREAM),
        (ProviderFamily::Anthropic, ANTHROPIC_STREAM),
    ] {
        let whole = comparable(&run_chunked(family, input.as_bytes(), input.len()));
        assert!(whole.len() > 3);
        for size in [1, 2, 3, 7, 16, 61] {
            let chunked = comparable(&run_chunked(family, input.as_bytes(), size));
            assert_eq!(chunked, whole, "{} stream split every {} bytes", family, size);
        }
    }
}

#[test]
fn test_responses_tool_call_reconstruction() {
    let output = run_chunked(ProviderFamily::OpenAi, RESPONSES_STREAM.as_bytes(), 5);
    let calls = tool_calls(&output);

    let named: Vec<&Value> = calls.iter().filter(|c| c["function"]["name"].is_string()).collect();
    assert_eq!(named.len(), 1, "one tool call is announced exactly once");
    assert_eq!(named[0]["index"], 0);
    assert_eq!(named[0]["id"], "call_1");
    assert_eq!(named[0]["function"]["name"], "lookup");

    assert!(calls.iter().all(|c| c["index"] == 0));
    let arguments: String = calls.iter().map(|c| c["function"]["arguments"].as_str().unwrap()).collect();
    assert_eq!(arguments, "{\"q\":\"cat\"}");

    let chunks = comparable(&output);
    let finish = chunks.iter().rev().find(|c| c.is_object()).unwrap();
    assert_eq!(finish["choices"][0]["finish_reason"], "tool_calls");
    assert_eq!(finish["usage"]["total_tokens"], 14);
}

#[test]
fn test_anthropic_tool_call_reconstruction() {
    let output = run_chunked(ProviderFamily::Anthropic, ANTHROPIC_STREAM.as_bytes(), 11);
    let calls = tool_calls(&output);

    assert_eq!(calls[0]["index"], 0);
    assert_eq!(calls[0]["id"], "toolu_1");
    assert_eq!(calls[0]["function"]["name"], "lookup");
    let arguments: String = calls.iter().map(|c| c["function"]["arguments"].as_str().unwrap()).collect();
    assert_eq!(arguments, "{\"q\":\"cat\"}");

    assert_eq!(content(&output), "Żółw ");
    let reasoning: Vec<Value> = comparable(&output)
        .into_iter()
        .filter(|c| c["choices"][0]["delta"]["reasoning_content"].is_string())
        .collect();
    assert_eq!(reasoning.len(), 1);
}

#[test]
fn test_stream_without_completion_is_terminated() {
    let input = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"partial\"}\n\n";
    let output = run_chunked(ProviderFamily::OpenAi, input.as_bytes(), 4);

    assert!(output.ends_with("data: [DONE]\n\n"));
    assert_eq!(output.matches("data: [DONE]").count(), 1);
    assert_eq!(content(&output), "partial");
    let chunks = comparable(&output);
    let last_chunk = &chunks[chunks.len() - 2];
    assert_eq!(last_chunk["choices"][0]["finish_reason"], "stop");
}

#[test]
fn test_malformed_event_emits_error_and_sentinel() {
    let input = "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\"}}\n\n";
    let output = run_chunked(ProviderFamily::Anthropic, input.as_bytes(), input.len());

    let chunks = comparable(&output);
    assert_eq!(chunks[0]["error"]["type"], "stream_error");
    assert_eq!(chunks[0]["error"]["message"], "upstream stream could not be translated");
    assert!(!output.contains("missing field"));
    assert!(output.ends_with("data: [DONE]\n\n"));
}

#[test]
fn test_upstream_sentinel_and_unknown_events_are_ignored() {
    let input = concat!(
        "data: {\"type\":\"response.in_progress\"}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"ok\"}\n\n",
        "data: [DONE]\n\n",
    );
    let output = run_chunked(ProviderFamily::OpenAi, input.as_bytes(), 9);
    assert_eq!(content(&output), "ok");
    assert_eq!(output.matches("data: [DONE]").count(), 1);
}

#[test]
fn test_untagged_events_do_not_end_the_stream() {
    let input = concat!(
        "data: {\"sequence_number\":1}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"hello\"}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{}}\n\n",
    );
    let output = run_chunked(ProviderFamily::OpenAi, input.as_bytes(), 6);

    assert_eq!(content(&output), "hello");
    let chunks = comparable(&output);
    assert!(chunks.iter().all(|c| c.get("error").is_none()));
    assert_eq!(chunks[chunks.len() - 2]["choices"][0]["finish_reason"], "stop");

    let input = concat!(
        "data: {\"index\":0}\n\n",
        "event: content_block_delta\n",
        "data: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );
    let output = run_chunked(ProviderFamily::Anthropic, input.as_bytes(), 5);
    assert_eq!(content(&output), "hi");
    assert!(comparable(&output).iter().all(|c| c.get("error").is_none()));
}

#[test]
fn test_fail_after_completion_emits_nothing() {
    let mut transformer = transformer_for(ProviderFamily::Anthropic, "m").unwrap();
    let frames = transformer.push(b"data: {\"type\":\"message_stop\"}\n\n");
    assert!(frames.last().unwrap().is_done());
    assert!(transformer.fail("late").is_empty());
    assert!(transformer.finish().is_empty());
}

#[test]
fn test_common_family_has_no_stream_transformer() {
    assert!(transformer_for(ProviderFamily::Common, "m").is_none());
}

#[test]
fn test_normalizer_is_idempotent() {
    let payload = json!({
        "id": "resp_7",
        "created_at": 1_760_000_000,
        "model": "gpt-5.1-2025-11-13",
        "status": "completed",
        "output": [
            {"type": "message", "content": [{"type": "output_text", "text": "a"}, {"type": "output_text", "text": "b"}]},
            {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "lookup", "arguments": "{}"}
        ],
        "usage": {"input_tokens": 1, "output_tokens": 2, "total_tokens": 3}
    });

    let first = serde_json::to_vec(&normalize_responses(&payload, "fallback").unwrap()).unwrap();
    let second = serde_json::to_vec(&normalize_responses(&payload, "fallback").unwrap()).unwrap();
    assert_eq!(first, second);

    let completion: Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(completion["choices"][0]["message"]["content"], "ab");
    assert_eq!(completion["choices"][0]["message"]["tool_calls"][0]["id"], "call_1");
}
