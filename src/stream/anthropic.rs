//!
//! Anthropic messages stream to canonical chunks.
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
/// Anthropic streaming events, keyed by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    MessageStart {
        #[serde(default)]
        message: MessageStartBody,
    },
    ContentBlockStart {
        index: u64,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: u64,
        delta: BlockDelta,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop {},
    Error {
        #[serde(default)]
        error: Option<ErrorBody>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct MessageStartBody {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

///
/// Per-request transformer for the Anthropic event vocabulary.
///
/// Tool calls are keyed by content block index.
pub struct AnthropicStreamTransformer {
    parser: SseLineParser,
    out: CanonicalStream,
    /** `message_delta` reported `max_tokens` */
    truncated: bool,
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

/* --- start of code -------------------------------------------------------------------------- */

impl AnthropicStreamTransformer {
    pub fn new(model: &str) -> Self {
        Self {
            parser: SseLineParser::new(),
            out: CanonicalStream::new(model),
            truncated: false,
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    fn handle(&mut self, payload: Value) -> Vec<CanonicalFrame> {
        let event: AnthropicEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                let err = ProxyError::StreamTransform(format!("malformed anthropic event: {}", e));
                return self.out.fail_internal(&err.to_string());
            }
        };

        match event {
            AnthropicEvent::MessageStart { message } => {
                self.record_usage(message.usage);
                vec![self.out.role()]
            }
            AnthropicEvent::ContentBlockStart { index, content_block } => match content_block {
                ContentBlock::ToolUse { id, name, input } => {
                    let key = index.to_string();
                    let mut frames: Vec<CanonicalFrame> = self.out.tool_start(&key, &id, &name).into_iter().collect();
                    // some upstreams send the whole input up front instead of json deltas
                    if input.as_object().is_some_and(|o| !o.is_empty()) {
                        frames.extend(self.out.tool_arguments(&key, &input.to_string()));
                    }
                    frames
                }
                ContentBlock::Other => Vec::new(),
            },
            AnthropicEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => vec![self.out.content(&text)],
                BlockDelta::InputJsonDelta { partial_json } => {
                    self.out.tool_arguments(&index.to_string(), &partial_json).into_iter().collect()
                }
                BlockDelta::ThinkingDelta { thinking } => vec![self.out.reasoning(&thinking)],
                BlockDelta::Other => Vec::new(),
            },
            AnthropicEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.as_deref() == Some("max_tokens") {
                    self.truncated = true;
                }
                self.record_usage(usage);
                Vec::new()
            }
            AnthropicEvent::MessageStop {} => {
                let usage = self.usage();
                self.out.complete(self.truncated, usage)
            }
            AnthropicEvent::Error { error } => {
                let message = error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "upstream reported an error".to_string());
                self.out.fail(&message)
            }
            AnthropicEvent::Unknown => Vec::new(),
        }
    }

    fn record_usage(&mut self, usage: Option<AnthropicUsage>) {
        if let Some(usage) = usage {
            self.prompt_tokens = usage.input_tokens.or(self.prompt_tokens);
            self.completion_tokens = usage.output_tokens.or(self.completion_tokens);
        }
    }

    fn usage(&self) -> Option<Usage> {
        if self.prompt_tokens.is_none() && self.completion_tokens.is_none() {
            return None;
        }
        let prompt_tokens = self.prompt_tokens.unwrap_or(0);
        let completion_tokens = self.completion_tokens.unwrap_or(0);
        Some(Usage { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens })
    }
}

impl StreamTransformer for AnthropicStreamTransformer {
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
