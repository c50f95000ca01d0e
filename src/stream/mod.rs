//!
//! Streaming response transformers.
//!
//! Each transformer is a per-request object that consumes a vendor SSE byte
//! stream and produces canonical chat-completion chunks. Both vendor families
//! share [CanonicalStream], which owns the chunk envelope, the tool-call
//! accumulator and the completion flag, so the termination rules live in one
//! place: exactly one final chunk, immediately followed by `data: [DONE]`.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- modules --------------------------------------------------------------------------------- */

pub mod anthropic;
pub mod responses;
pub mod sse;

/* --- uses ------------------------------------------------------------------------------------ */

use std::collections::HashMap;

use crate::converter::canonical::{
    CHUNK_OBJECT, CanonicalFrame, ChatCompletionChunk, ChunkChoice, Delta, FinishReason,
    FunctionDelta, STREAM_ERROR_MESSAGE, ToolCallDelta, Usage, completion_id,
};
use crate::provider::ProviderFamily;

pub use anthropic::AnthropicStreamTransformer;
pub use responses::ResponsesStreamTransformer;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Vendor SSE to canonical SSE transformer.
pub trait StreamTransformer: Send {
    ///
    /// Consume one upstream chunk.
    ///
    /// # Returns
    ///  * Canonical frames in the order their vendor events were parsed
    fn push(&mut self, chunk: &[u8]) -> Vec<CanonicalFrame>;

    ///
    /// Upstream body ended; terminate the stream if it is still open.
    fn finish(&mut self) -> Vec<CanonicalFrame>;

    ///
    /// Upstream body broke; emit an error frame and terminate.
    ///
    /// `detail` is internal error text, sent to clients only in debug mode.
    fn fail(&mut self, detail: &str) -> Vec<CanonicalFrame>;

    /// Whether the terminal sentinel has been produced
    fn is_complete(&self) -> bool;
}

///
/// One reconstructed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallEntry {
    pub index: u32,
    pub id: String,
    pub name: String,
    pub arguments: String,
}

///
/// Tool calls of one stream keyed by the vendor item identifier.
///
/// Indices are handed out once, in first-seen order, and never reused.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    entries: HashMap<String, ToolCallEntry>,
    next_index: u32,
}

///
/// Shared canonical output state of one stream.
#[derive(Debug)]
pub struct CanonicalStream {
    id: String,
    model: String,
    created: i64,
    tools: ToolCallAccumulator,
    completed: bool,
}

/* --- start of code -------------------------------------------------------------------------- */

///
/// Streaming transformer for a provider family.
///
/// # Returns
///  * `None` for the passthrough family, whose stream is already canonical
pub fn transformer_for(family: ProviderFamily, model: &str) -> Option<Box<dyn StreamTransformer>> {
    match family {
        ProviderFamily::Anthropic => Some(Box::new(AnthropicStreamTransformer::new(model))),
        ProviderFamily::OpenAi => Some(Box::new(ResponsesStreamTransformer::new(model))),
        ProviderFamily::Common => None,
    }
}

impl ToolCallAccumulator {
    ///
    /// Register a new call.
    ///
    /// # Returns
    ///  * Assigned index, or `None` if the key was already registered
    pub fn start(&mut self, key: &str, id: &str, name: &str) -> Option<u32> {
        if self.entries.contains_key(key) {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        self.entries.insert(
            key.to_string(),
            ToolCallEntry { index, id: id.to_string(), name: name.to_string(), arguments: String::new() },
        );
        Some(index)
    }

    ///
    /// Append argument text to a registered call.
    ///
    /// # Returns
    ///  * Index of the call, or `None` for an unknown key
    pub fn append(&mut self, key: &str, delta: &str) -> Option<u32> {
        let entry = self.entries.get_mut(key)?;
        entry.arguments.push_str(delta);
        Some(entry.index)
    }

    pub fn get(&self, key: &str) -> Option<&ToolCallEntry> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl CanonicalStream {
    pub fn new(model: &str) -> Self {
        Self {
            id: completion_id(),
            model: model.to_string(),
            created: chrono::Utc::now().timestamp(),
            tools: ToolCallAccumulator::default(),
            completed: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Role marker chunk opening the assistant message
    pub fn role(&self) -> CanonicalFrame {
        self.chunk(Delta { role: Some("assistant"), ..Default::default() }, None, None)
    }

    pub fn content(&self, text: &str) -> CanonicalFrame {
        self.chunk(Delta { content: Some(text.to_string()), ..Default::default() }, None, None)
    }

    pub fn reasoning(&self, text: &str) -> CanonicalFrame {
        self.chunk(Delta { reasoning_content: Some(text.to_string()), ..Default::default() }, None, None)
    }

    ///
    /// Open a tool call and emit its first fragment (id, type, name).
    ///
    /// Returns `None` when `key` was already started.
    pub fn tool_start(&mut self, key: &str, id: &str, name: &str) -> Option<CanonicalFrame> {
        let index = self.tools.start(key, id, name)?;
        Some(self.tool_chunk(ToolCallDelta {
            index,
            id: Some(id.to_string()),
            call_type: Some("function"),
            function: FunctionDelta { name: Some(name.to_string()), arguments: String::new() },
        }))
    }

    ///
    /// Continuation fragment carrying only index and new argument text.
    pub fn tool_arguments(&mut self, key: &str, delta: &str) -> Option<CanonicalFrame> {
        let Some(index) = self.tools.append(key, delta) else {
            tracing::debug!("Argument delta for unknown tool call '{}' ignored", key);
            return None;
        };
        Some(self.tool_chunk(ToolCallDelta {
            index,
            id: None,
            call_type: None,
            function: FunctionDelta { name: None, arguments: delta.to_string() },
        }))
    }

    ///
    /// A call delivered whole in one event.
    pub fn tool_complete(&mut self, key: &str, id: &str, name: &str, arguments: &str) -> Option<CanonicalFrame> {
        let index = self.tools.start(key, id, name)?;
        self.tools.append(key, arguments);
        Some(self.tool_chunk(ToolCallDelta {
            index,
            id: Some(id.to_string()),
            call_type: Some("function"),
            function: FunctionDelta { name: Some(name.to_string()), arguments: arguments.to_string() },
        }))
    }

    ///
    /// Final chunk followed by the sentinel.
    ///
    /// # Arguments
    ///  * `truncated` - vendor reported an incomplete completion
    ///  * `usage` - token counts for the final chunk, if reported
    pub fn complete(&mut self, truncated: bool, usage: Option<Usage>) -> Vec<CanonicalFrame> {
        let reason = if truncated {
            FinishReason::Length
        } else if self.tools.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };
        self.terminate(reason, usage)
    }

    ///
    /// In-band error frame carrying a vendor-reported message, then termination.
    pub fn fail(&mut self, message: &str) -> Vec<CanonicalFrame> {
        self.fail_with(message.to_string(), None)
    }

    ///
    /// In-band error frame for a failure of the gateway itself, then termination.
    ///
    /// Clients see [STREAM_ERROR_MESSAGE]; `detail` is logged and kept for debug mode.
    pub fn fail_internal(&mut self, detail: &str) -> Vec<CanonicalFrame> {
        self.fail_with(STREAM_ERROR_MESSAGE.to_string(), Some(detail.to_string()))
    }

    fn fail_with(&mut self, message: String, detail: Option<String>) -> Vec<CanonicalFrame> {
        if self.completed {
            return Vec::new();
        }
        tracing::error!("Stream for {} failed: {}", self.id, detail.as_deref().unwrap_or(&message));
        let mut frames = vec![CanonicalFrame::Error { message, detail }];
        frames.extend(self.terminate(FinishReason::Stop, None));
        frames
    }

    ///
    /// Synthesized termination when the upstream never signalled completion.
    pub fn finish_open(&mut self) -> Vec<CanonicalFrame> {
        if self.completed {
            return Vec::new();
        }
        tracing::warn!("Upstream stream for {} ended without a completion event", self.id);
        self.terminate(FinishReason::Stop, None)
    }

    fn terminate(&mut self, reason: FinishReason, usage: Option<Usage>) -> Vec<CanonicalFrame> {
        if self.completed {
            return Vec::new();
        }
        self.completed = true;
        tracing::debug!("Stream {} finished: {:?}, {} tool call(s)", self.id, reason, self.tools.len());
        vec![self.chunk(Delta::default(), Some(reason), usage), CanonicalFrame::Done]
    }

    fn tool_chunk(&self, call: ToolCallDelta) -> CanonicalFrame {
        self.chunk(Delta { tool_calls: Some(vec![call]), ..Default::default() }, None, None)
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<FinishReason>, usage: Option<Usage>) -> CanonicalFrame {
        CanonicalFrame::Chunk(ChatCompletionChunk {
            id: self.id.clone(),
            object: CHUNK_OBJECT,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice { index: 0, delta, finish_reason }],
            usage,
        })
    }
}
