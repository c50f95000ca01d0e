//!
//! Non-streaming responses normalizer.
//!
//! Turns an OpenAI responses object into a canonical chat-completion object.
//! Callers fall back to the raw vendor payload when normalization fails.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde::Deserialize;
use serde_json::{Value, json};

use crate::converter::canonical::COMPLETION_OBJECT;
use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
struct ResponsesObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    status: Option<String>,
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputItem {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(rename = "function_call")]
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputContent {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

/* --- constants ------------------------------------------------------------------------------ */

const VENDOR_ID_PREFIX: &str = "resp_";
const CANONICAL_ID_PREFIX: &str = "chatcmpl-";

/** finish reason for any status other than `completed` */
const UNKNOWN_FINISH_REASON: &str = "unknown";

/* --- start of code -------------------------------------------------------------------------- */

///
/// Normalize a responses object.
///
/// The output is a pure function of `payload` only when the payload carries
/// both `id` and `created_at`; otherwise a time-based id and timestamp are
/// filled in, so repeated calls can differ in those two fields.
///
/// # Arguments
///  * `payload` - vendor JSON
///  * `fallback_model` - model id used when the payload names none
///
/// # Returns
///  * Canonical chat-completion object
///  * `ProxyError::Normalization` if the payload is not a responses object
pub fn normalize_responses(payload: &Value, fallback_model: &str) -> Result<Value> {
    if !payload.is_object() {
        return Err(ProxyError::Normalization("payload is not a JSON object".to_string()));
    }
    let response = ResponsesObject::deserialize(payload)
        .map_err(|e| ProxyError::Normalization(format!("unexpected responses shape: {}", e)))?;

    let id = match response.id.as_deref() {
        Some(id) => match id.strip_prefix(VENDOR_ID_PREFIX) {
            Some(rest) => format!("{}{}", CANONICAL_ID_PREFIX, rest),
            None => id.to_string(),
        },
        None => format!("{}{}", CANONICAL_ID_PREFIX, chrono::Utc::now().timestamp_millis()),
    };

    let mut content: Option<String> = None;
    let mut tool_calls = Vec::new();
    for item in &response.output {
        match item {
            OutputItem::Message { content: blocks } if content.is_none() => {
                content = Some(
                    blocks
                        .iter()
                        .filter_map(|b| match b {
                            OutputContent::OutputText { text } => Some(text.as_str()),
                            OutputContent::Other => None,
                        })
                        .collect(),
                );
            }
            OutputItem::FunctionCall { id, call_id, name, arguments } => {
                let call_id = call_id.clone().or_else(|| id.clone()).unwrap_or_default();
                tool_calls.push(json!({
                    "id": call_id,
                    "type": "function",
                    "function": { "name": name, "arguments": arguments },
                }));
            }
            _ => {}
        }
    }

    let finish_reason = match response.status.as_deref() {
        Some("completed") => "stop",
        _ => UNKNOWN_FINISH_REASON,
    };

    let usage = response.usage.unwrap_or_default();
    let prompt_tokens = usage.input_tokens.unwrap_or(0);
    let completion_tokens = usage.output_tokens.unwrap_or(0);
    let total_tokens = usage.total_tokens.unwrap_or(0);

    let mut message = json!({ "role": "assistant", "content": content });
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }

    tracing::debug!("Normalized responses object {} ({})", id, finish_reason);

    Ok(json!({
        "id": id,
        "object": COMPLETION_OBJECT,
        "created": response.created_at.unwrap_or_else(|| chrono::Utc::now().timestamp()),
        "model": response.model.unwrap_or_else(|| fallback_model.to_string()),
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": total_tokens,
        },
    }))
}
