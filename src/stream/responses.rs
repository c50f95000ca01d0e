//!
//! OpenAI responses stream to canonical chunks.
//!
//! Function calls are keyed by output item id. A call announced with
//! `response.output_item.added` streams its arguments through
//! `response.function_call_arguments.delta`; a call that only shows up in
//! `response.output_item.done` is emitted whole.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde::Deserialize;
use serde_json::Value;

use crate::converter::canonical::{CanonicalFrame, Usage};
use crate::error::ProxyError;
use crate::stream::sse::SseLineParser;
use crate::stream::{CanonicalStream, StreamTransformer};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Responses streaming events, keyed by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponsesEvent {
    #[serde(rename = "response.created")]
    Created {},
    #[serde(rename = "response.output_text.delta", alias = "response.text.delta")]
    TextDelta { delta: String },
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningDelta { delta: String },
    #[serde(rename = "response.output_item.added")]
    ItemAdded { item: OutputItem },
    #[serde(rename = "response.function_call_arguments.delta")]
    ArgumentsDelta { item_id: String, delta: String },
    #[serde(rename = "response.output_item.done")]
    ItemDone { item: OutputItem },
    #[serde(rename = "response.completed")]
    Completed {
        #[serde(default)]
        response: Option<ResponseBody>,
    },
    #[serde(rename = "response.incomplete")]
    Incomplete {
        #[serde(default)]
        response: Option<ResponseBody>,
    },
    #[serde(rename = "response.failed")]
    Failed {
        #[serde(default)]
        response: Option<ResponseBody>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<ErrorBody>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputItem {
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

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    usage: Option<ResponsesUsage>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

///
/// Per-request transformer for the responses event vocabulary.
pub struct ResponsesStreamTransformer {
    parser: SseLineParser,
    out: CanonicalStream,
}

/* --- start of code -------------------------------------------------------------------------- */

impl ResponsesStreamTransformer {
    pub fn new(model: &str) -> Self {
        Self { parser: SseLineParser::new(), out: CanonicalStream::new(model) }
    }

    fn handle(&mut self, payload: Value) -> Vec<CanonicalFrame> {
        let event: ResponsesEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                let err = ProxyError::StreamTransform(format!("malformed responses event: {}", e));
                return self.out.fail_internal(&err.to_string());
            }
        };

        match event {
            ResponsesEvent::Created {} => vec![self.out.role()],
            ResponsesEvent::TextDelta { delta } => vec![self.out.content(&delta)],
            ResponsesEvent::ReasoningDelta { delta } => vec![self.out.reasoning(&delta)],
            ResponsesEvent::ItemAdded { item } => match item {
                OutputItem::FunctionCall { id, call_id, name, arguments } => {
                    let (key, call_id) = call_keys(id, call_id);
                    let mut frames: Vec<CanonicalFrame> =
                        self.out.tool_start(&key, &call_id, &name).into_iter().collect();
                    if !arguments.is_empty() {
                        frames.extend(self.out.tool_arguments(&key, &arguments));
                    }
                    frames
                }
                OutputItem::Other => Vec::new(),
            },
            ResponsesEvent::ArgumentsDelta { item_id, delta } => {
                self.out.tool_arguments(&item_id, &delta).into_iter().collect()
            }
            ResponsesEvent::ItemDone { item } => match item {
                OutputItem::FunctionCall { id, call_id, name, arguments } => {
                    let (key, call_id) = call_keys(id, call_id);
                    // already streamed through deltas when the key is known
                    self.out.tool_complete(&key, &call_id, &name, &arguments).into_iter().collect()
                }
                OutputItem::Other => Vec::new(),
            },
            ResponsesEvent::Completed { response } => self.out.complete(false, usage_of(response.as_ref())),
            ResponsesEvent::Incomplete { response } => self.out.complete(true, usage_of(response.as_ref())),
            ResponsesEvent::Failed { response } => {
                let message = response
                    .and_then(|r| r.error)
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "upstream response failed".to_string());
                self.out.fail(&message)
            }
            ResponsesEvent::Error { message, error } => {
                let message = message
                    .or_else(|| error.and_then(|e| e.message))
                    .unwrap_or_else(|| "upstream reported an error".to_string());
                self.out.fail(&message)
            }
            ResponsesEvent::Unknown => Vec::new(),
        }
    }
}

/// Accumulator key (item id) and the call id clients echo back
fn call_keys(id: Option<String>, call_id: Option<String>) -> (String, String) {
    match (id, call_id) {
        (Some(id), Some(call_id)) => (id, call_id),
        (Some(id), None) => (id.clone(), id),
        (None, Some(call_id)) => (call_id.clone(), call_id),
        (None, None) => {
            let generated = format!("call_{}", uuid::Uuid::new_v4().simple());
            (generated.clone(), generated)
        }
    }
}

fn usage_of(response: Option<&ResponseBody>) -> Option<Usage> {
    let usage = response?.usage?;
    Some(Usage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens.unwrap_or(usage.input_tokens + usage.output_tokens),
    })
}

impl StreamTransformer for ResponsesStreamTransformer {
    fn push(&mut self, chunk: &[u8]) -> Vec<CanonicalFrame> {
        let mut frames = Vec::new();
        for event in self.parser.push(chunk) {
            if self.out.is_complete() {
                break;
            }
            if let Some(payload) = event.typed_json() {
                frames.extend(self.handle(payload));
            }
        }
        frames
    }

    fn finish(&mut self) -> Vec<CanonicalFrame> {
        let mut frames = Vec::new();
        for event in self.parser.finish() {
            if self.out.is_complete() {
                break;
            }
            if let Some(payload) = event.typed_json() {
                frames.extend(self.handle(payload));
            }
        }
        frames.extend(self.out.finish_open());
        frames
    }

    fn fail(&mut self, detail: &str) -> Vec<CanonicalFrame> {
        self.out.fail_internal(detail)
    }

    fn is_complete(&self) -> bool {
        self.out.is_complete()
    }
}
