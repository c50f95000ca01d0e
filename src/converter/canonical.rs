//!
//! Canonical chat-completion wire types.
//!
//! The request side is what clients post to `/v1/chat/completions`. Unknown
//! fields are kept in flattened `extra` maps so the passthrough family can
//! forward them untouched. The response side covers the streaming chunk
//! format and its SSE framing.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/* --- constants ------------------------------------------------------------------------------- */

/** terminal frame of every canonical stream */
pub const SSE_DONE: &[u8] = b"data: [DONE]\n\n";

/** object marker of streaming chunks */
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/** object marker of non-streaming completions */
pub const COMPLETION_OBJECT: &str = "chat.completion";

/** client-facing text of an in-band error the gateway itself caused */
pub const STREAM_ERROR_MESSAGE: &str = "upstream stream could not be translated";

/* --- request types --------------------------------------------------------------------------- */

///
/// Provider-agnostic chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalRequest {
    /** client-facing model id, resolved through the catalog */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /** effort-style directive: `{"effort": "..."}` */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    /** budget-style directive: `{"type": "enabled", "budget_tokens": n}` */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

///
/// One conversation message.
///
/// `role` stays a string so that unknown roles surface as transform errors
/// naming the offending field instead of opaque parse failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

///
/// Message content: plain string or multimodal parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

///
/// Structured content part (`text`, `image_url`, or anything newer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

///
/// Image reference; clients send either `{"url": ...}` or a bare string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageUrl {
    Object {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Url(String),
}

///
/// Assistant tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

///
/// Function name and arguments; arguments are normally a JSON-encoded string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

///
/// Tool declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type", default = "default_function_type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

///
/// Tool choice: `"auto" | "none" | "required"` or a named function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Named {
        #[serde(rename = "type")]
        choice_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function: Option<NamedFunction>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedFunction {
    pub name: String,
}

fn default_function_type() -> String {
    "function".to_string()
}

/* --- request helpers ------------------------------------------------------------------------- */

impl CanonicalRequest {
    /// Whether the client asked for a streamed response
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    ///
    /// Effort requested by the client, from `reasoning.effort` or `reasoning_effort`.
    pub fn requested_effort(&self) -> Option<&str> {
        self.reasoning
            .as_ref()
            .and_then(|r| r.get("effort"))
            .and_then(Value::as_str)
            .or(self.reasoning_effort.as_deref())
    }
}

impl Content {
    ///
    /// Concatenated text of the content (parts joined without separator).
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts.iter().filter_map(|p| p.text.as_deref()).collect(),
        }
    }
}

impl ImageUrl {
    pub fn url(&self) -> &str {
        match self {
            ImageUrl::Object { url, .. } => url,
            ImageUrl::Url(url) => url,
        }
    }
}

impl FunctionCall {
    ///
    /// Arguments as the JSON-encoded string the canonical protocol carries.
    pub fn arguments_string(&self) -> String {
        match &self.arguments {
            Value::String(s) => s.clone(),
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        }
    }

    ///
    /// Arguments as a JSON value; unparsable strings are kept as strings.
    pub fn arguments_value(&self) -> Value {
        match &self.arguments {
            Value::String(s) if s.trim().is_empty() => json!({}),
            Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| self.arguments.clone()),
            Value::Null => json!({}),
            other => other.clone(),
        }
    }
}

/* --- response types -------------------------------------------------------------------------- */

///
/// Canonical finish reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
}

///
/// Token usage in canonical naming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

///
/// One streamed delta chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    /** serialized as `null` until the final chunk */
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

///
/// Tool-call fragment: the first fragment of a call carries id, type and
/// name; continuations carry only the index and new argument text.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<&'static str>,
    pub function: FunctionDelta,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub arguments: String,
}

///
/// One frame of the canonical output stream.
#[derive(Debug, Clone)]
pub enum CanonicalFrame {
    Chunk(ChatCompletionChunk),
    /// In-band error marker; always followed by a final chunk and `Done`.
    ///
    /// `message` is safe to show clients; `detail` holds internal error text
    /// that is only sent in debug mode.
    Error { message: String, detail: Option<String> },
    Done,
}

impl CanonicalFrame {
    ///
    /// Encode the frame as an SSE `data:` frame, without internal error detail.
    pub fn to_sse(&self) -> Bytes {
        self.encode(false)
    }

    ///
    /// Encode the frame as an SSE `data:` frame.
    ///
    /// # Arguments
    ///  * `debug_errors` - send the internal detail of error frames instead of the stable message
    pub fn encode(&self, debug_errors: bool) -> Bytes {
        match self {
            CanonicalFrame::Done => Bytes::from_static(SSE_DONE),
            CanonicalFrame::Chunk(chunk) => match serde_json::to_string(chunk) {
                Ok(json) => sse_data(&json),
                Err(e) => {
                    tracing::error!("Failed to serialize canonical chunk: {}", e);
                    if debug_errors { error_frame(&e.to_string()) } else { error_frame(STREAM_ERROR_MESSAGE) }
                }
            },
            CanonicalFrame::Error { message, detail } => match detail {
                Some(detail) if debug_errors => error_frame(detail),
                _ => error_frame(message),
            },
        }
    }

    /// Whether this is the terminal sentinel
    pub fn is_done(&self) -> bool {
        matches!(self, CanonicalFrame::Done)
    }
}

/// Wrap a JSON payload as one SSE data frame
pub fn sse_data(json: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", json))
}

/// In-band stream error frame
pub fn error_frame(message: &str) -> Bytes {
    sse_data(&json!({ "error": { "message": message, "type": "stream_error" } }).to_string())
}

/// Fresh canonical completion id
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}
