//!
//! Canonical to OpenAI responses request transformer.
//!
//! System and developer messages become `instructions`, the conversation
//! becomes a list of `input` items (messages, function calls and function
//! call outputs) and tools are flattened to the responses tool shape.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde_json::{Map, Value, json};

use crate::converter::canonical::{CanonicalRequest, Content, ContentPart, Message, ToolChoice};
use crate::converter::policy::{REASONING_SUMMARY_MODE, ReasoningPolicy, RequestPolicy};
use crate::converter::{RequestTransformer, clamp_min};
use crate::error::{ProxyError, Result};
use crate::provider::ProviderFamily;

/* --- constants ------------------------------------------------------------------------------ */

const PROVIDER: &str = "openai";

/** smallest output budget the responses API accepts */
const MIN_OUTPUT_TOKENS: u32 = 16;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Transformer for the OpenAI responses family.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsesTransformer;

/* --- start of code -------------------------------------------------------------------------- */

impl RequestTransformer for ResponsesTransformer {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAi
    }

    fn transform(&self, request: &CanonicalRequest, model_id: &str) -> Result<Value> {
        if request.messages.is_empty() {
            return Err(ProxyError::transform(PROVIDER, "messages"));
        }

        let mut instructions = Vec::new();
        let mut input = Vec::new();

        for (i, msg) in request.messages.iter().enumerate() {
            match msg.role.as_str() {
                "system" | "developer" => {
                    let text = msg.content.as_ref().map(Content::text).unwrap_or_default();
                    if !text.is_empty() {
                        instructions.push(text);
                    }
                }
                "user" => input.push(json!({
                    "type": "message",
                    "role": "user",
                    "content": user_content(msg.content.as_ref()),
                })),
                "assistant" => append_assistant_items(&mut input, msg),
                "tool" => {
                    let call_id = msg.tool_call_id.as_deref().ok_or_else(|| {
                        ProxyError::transform(PROVIDER, format!("messages[{}].tool_call_id", i))
                    })?;
                    input.push(json!({
                        "type": "function_call_output",
                        "call_id": call_id,
                        "output": msg.content.as_ref().map(Content::text).unwrap_or_default(),
                    }));
                }
                _ => {
                    return Err(ProxyError::transform(PROVIDER, format!("messages[{}].role", i)));
                }
            }
        }

        if input.is_empty() {
            return Err(ProxyError::transform(PROVIDER, "messages"));
        }

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model_id));
        body.insert("input".to_string(), Value::Array(input));
        body.insert("stream".to_string(), json!(request.is_streaming()));
        body.insert("store".to_string(), json!(false));

        if !instructions.is_empty() {
            body.insert("instructions".to_string(), json!(instructions.join("\n\n")));
        }
        if let Some(max_tokens) = request.max_tokens {
            body.insert(
                "max_output_tokens".to_string(),
                json!(clamp_min(max_tokens, MIN_OUTPUT_TOKENS)),
            );
        }
        if let Some(temperature) = request.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.top_p {
            body.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            let tools: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    let mut flat = json!({
                        "type": "function",
                        "name": tool.function.name,
                        "parameters": tool.function.parameters.clone()
                            .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
                    });
                    if let Some(description) = &tool.function.description {
                        flat["description"] = json!(description);
                    }
                    flat
                })
                .collect();
            body.insert("tools".to_string(), Value::Array(tools));
        }
        if let Some(choice) = request.tool_choice.as_ref().and_then(convert_tool_choice) {
            body.insert("tool_choice".to_string(), choice);
        }
        if let Some(reasoning) = client_reasoning(request) {
            body.insert("reasoning".to_string(), reasoning);
        }

        tracing::debug!("Converted {} message(s) to responses input", request.messages.len());
        Ok(Value::Object(body))
    }

    fn apply_policy(&self, body: &mut Value, policy: &RequestPolicy) {
        let Some(obj) = body.as_object_mut() else {
            return;
        };

        if let Some(prompt) = policy.system_prompt() {
            let instructions = match obj.get("instructions").and_then(Value::as_str) {
                Some(existing) if !existing.is_empty() => format!("{}\n\n{}", prompt, existing),
                _ => prompt.to_string(),
            };
            obj.insert("instructions".to_string(), Value::String(instructions));
        }

        if let Some(max_output) = obj.get("max_output_tokens").and_then(Value::as_u64) {
            if max_output < u64::from(MIN_OUTPUT_TOKENS) {
                obj.insert("max_output_tokens".to_string(), json!(MIN_OUTPUT_TOKENS));
            }
        }

        match policy.reasoning {
            ReasoningPolicy::Auto => {}
            ReasoningPolicy::Off => {
                obj.remove("reasoning");
            }
            level => {
                if let Some(effort) = level.effort() {
                    obj.insert(
                        "reasoning".to_string(),
                        json!({ "effort": effort, "summary": REASONING_SUMMARY_MODE }),
                    );
                }
            }
        }
    }
}

/* --- helper functions ----------------------------------------------------------------------- */

fn user_content(content: Option<&Content>) -> Value {
    match content {
        Some(Content::Text(text)) => json!([{ "type": "input_text", "text": text }]),
        Some(Content::Parts(parts)) => Value::Array(parts.iter().filter_map(input_part).collect()),
        None => json!([{ "type": "input_text", "text": "" }]),
    }
}

fn input_part(part: &ContentPart) -> Option<Value> {
    match part.part_type.as_str() {
        "text" => part.text.as_ref().map(|text| json!({ "type": "input_text", "text": text })),
        "image_url" => part
            .image_url
            .as_ref()
            .map(|img| json!({ "type": "input_image", "image_url": img.url() })),
        _ => None,
    }
}

///
/// Assistant turns: text becomes an output message, tool calls become
/// `function_call` items in order.
fn append_assistant_items(input: &mut Vec<Value>, msg: &Message) {
    let text = msg.content.as_ref().map(Content::text).unwrap_or_default();
    if !text.is_empty() {
        input.push(json!({
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "output_text", "text": text }],
        }));
    }

    for call in msg.tool_calls.iter().flatten() {
        input.push(json!({
            "type": "function_call",
            "call_id": call.id,
            "name": call.function.name,
            "arguments": call.function.arguments_string(),
        }));
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> Option<Value> {
    match choice {
        ToolChoice::Mode(mode) => Some(json!(mode)),
        ToolChoice::Named { function, .. } => {
            function.as_ref().map(|f| json!({ "type": "function", "name": f.name }))
        }
    }
}

///
/// Reasoning object as sent by the client, or built from `reasoning_effort`.
fn client_reasoning(request: &CanonicalRequest) -> Option<Value> {
    if let Some(reasoning) = &request.reasoning {
        return Some(reasoning.clone());
    }
    request.reasoning_effort.as_ref().map(|effort| json!({ "effort": effort }))
}
