//!
//! Canonical to Anthropic messages request transformer.
//!
//! Converts canonical chat completion requests into the Anthropic messages
//! format: system messages move to the `system` block array, tool results are
//! grouped into user turns, assistant tool calls become `tool_use` blocks and
//! reasoning directives become a `thinking` budget.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde::Serialize;
use serde_json::{Value, json};

use crate::converter::canonical::{
    CanonicalRequest, Content, ContentPart, Message, Tool, ToolCall, ToolChoice,
};
use crate::converter::policy::{ReasoningPolicy, RequestPolicy};
use crate::converter::{RequestTransformer, clamp_min};
use crate::error::{ProxyError, Result};
use crate::provider::ProviderFamily;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Anthropic messages request body.
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<AnthropicContentBlock>,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
}

///
/// Anthropic message: role plus content blocks.
#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    /** user or assistant */
    pub role: &'static str,
    pub content: Vec<AnthropicContentBlock>,
}

///
/// Anthropic content block.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
    },
    Image {
        source: ImageSource,
    },
}

///
/// Image source; URL images only, data URLs are split into base64 sources.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Url { url: String },
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicToolChoice {
    Auto,
    Any,
    Tool { name: String },
}

///
/// Transformer for the Anthropic messages family.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicTransformer;

/* --- constants ------------------------------------------------------------------------------ */

/** provider family name used in transform errors */
const PROVIDER: &str = "anthropic";

/** default maximum tokens if not specified */
const DEFAULT_MAX_TOKENS: u32 = 8192;

/** answer room kept above a forced thinking budget */
const MIN_ANSWER_TOKENS: u32 = 1024;

/* --- start of code -------------------------------------------------------------------------- */

impl RequestTransformer for AnthropicTransformer {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Anthropic
    }

    fn transform(&self, request: &CanonicalRequest, model_id: &str) -> Result<Value> {
        if request.messages.is_empty() {
            return Err(ProxyError::transform(PROVIDER, "messages"));
        }

        tracing::debug!("Converting {} message(s) to Anthropic format", request.messages.len());

        let (system, messages) = self.convert_messages(&request.messages)?;

        let anthropic_request = AnthropicRequest {
            model: model_id.to_string(),
            system,
            messages,
            max_tokens: clamp_min(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS), 1),
            temperature: request.temperature,
            top_p: request.top_p,
            stream: request.is_streaming(),
            tools: self.convert_tools(request.tools.as_deref()),
            tool_choice: self.convert_tool_choice(request.tool_choice.as_ref()),
            thinking: self.convert_thinking(request),
        };

        Ok(serde_json::to_value(anthropic_request)?)
    }

    fn apply_policy(&self, body: &mut Value, policy: &RequestPolicy) {
        let Some(obj) = body.as_object_mut() else {
            return;
        };

        if let Some(prompt) = policy.system_prompt() {
            let prompt_block = json!({ "type": "text", "text": prompt });
            let system = match obj.remove("system") {
                Some(Value::String(existing)) if !existing.is_empty() => {
                    vec![prompt_block, json!({ "type": "text", "text": existing })]
                }
                Some(Value::Array(mut blocks)) => {
                    blocks.insert(0, prompt_block);
                    blocks
                }
                _ => vec![prompt_block],
            };
            obj.insert("system".to_string(), Value::Array(system));
        }

        match policy.reasoning {
            ReasoningPolicy::Auto => {}
            ReasoningPolicy::Off => {
                obj.remove("thinking");
            }
            level => {
                if let Some(budget) = level.budget_tokens() {
                    obj.insert(
                        "thinking".to_string(),
                        json!({ "type": "enabled", "budget_tokens": budget }),
                    );
                    // the vendor rejects max_tokens at or below the budget
                    let max_tokens = obj.get("max_tokens").and_then(Value::as_u64).unwrap_or(0);
                    if max_tokens <= u64::from(budget) {
                        obj.insert("max_tokens".to_string(), json!(budget + MIN_ANSWER_TOKENS));
                    }
                }
            }
        }
    }
}

impl AnthropicTransformer {
    ///
    /// Convert the canonical message list.
    ///
    /// # Returns
    ///  * System blocks and the converted conversation
    ///  * `ProxyError::Transform` on unknown roles or tool messages without a call id
    fn convert_messages(
        &self,
        messages: &[Message],
    ) -> Result<(Vec<AnthropicContentBlock>, Vec<AnthropicMessage>)> {
        let mut system = Vec::new();
        let mut converted = Vec::new();
        let mut pending_tool_results = Vec::new();

        for (i, msg) in messages.iter().enumerate() {
            match msg.role.as_str() {
                "system" | "developer" => {
                    let text = msg.content.as_ref().map(Content::text).unwrap_or_default();
                    if !text.is_empty() {
                        system.push(AnthropicContentBlock::Text { text });
                    }
                }
                "tool" => {
                    let tool_use_id = msg.tool_call_id.clone().ok_or_else(|| {
                        ProxyError::transform(PROVIDER, format!("messages[{}].tool_call_id", i))
                    })?;
                    pending_tool_results.push(AnthropicContentBlock::ToolResult {
                        tool_use_id,
                        content: self.convert_tool_result_content(msg.content.as_ref()),
                    });
                }
                "assistant" => {
                    self.flush_tool_results(&mut converted, &mut pending_tool_results);
                    converted.push(self.convert_assistant_message(msg));
                }
                "user" => {
                    self.flush_tool_results(&mut converted, &mut pending_tool_results);
                    converted.push(AnthropicMessage {
                        role: "user",
                        content: self.convert_user_content(msg.content.as_ref()),
                    });
                }
                _ => {
                    return Err(ProxyError::transform(PROVIDER, format!("messages[{}].role", i)));
                }
            }
        }

        self.flush_tool_results(&mut converted, &mut pending_tool_results);

        if converted.is_empty() {
            return Err(ProxyError::transform(PROVIDER, "messages"));
        }

        Ok((system, converted))
    }

    ///
    /// Emit collected tool results as one user turn.
    fn flush_tool_results(
        &self,
        converted: &mut Vec<AnthropicMessage>,
        pending: &mut Vec<AnthropicContentBlock>,
    ) {
        if pending.is_empty() {
            return;
        }
        tracing::debug!("Attaching {} tool result(s) as user turn", pending.len());
        converted.push(AnthropicMessage { role: "user", content: std::mem::take(pending) });
    }

    fn convert_assistant_message(&self, msg: &Message) -> AnthropicMessage {
        let mut content = Vec::new();

        if let Some(text) = msg.content.as_ref().map(Content::text) {
            if !text.is_empty() {
                content.push(AnthropicContentBlock::Text { text });
            }
        }

        content.extend(msg.tool_calls.iter().flatten().map(|call: &ToolCall| {
            AnthropicContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: call.function.arguments_value(),
            }
        }));

        if content.is_empty() {
            content.push(AnthropicContentBlock::Text { text: String::new() });
        }

        AnthropicMessage { role: "assistant", content }
    }

    fn convert_user_content(&self, content: Option<&Content>) -> Vec<AnthropicContentBlock> {
        let blocks = match content {
            Some(Content::Text(text)) => vec![AnthropicContentBlock::Text { text: text.clone() }],
            Some(Content::Parts(parts)) => parts.iter().filter_map(convert_part).collect(),
            None => Vec::new(),
        };

        if blocks.is_empty() {
            vec![AnthropicContentBlock::Text { text: String::new() }]
        } else {
            blocks
        }
    }

    fn convert_tool_result_content(&self, content: Option<&Content>) -> Value {
        match content {
            Some(Content::Text(text)) => Value::String(text.clone()),
            Some(Content::Parts(parts)) => Value::Array(
                parts
                    .iter()
                    .filter_map(convert_part)
                    .filter_map(|block| serde_json::to_value(block).ok())
                    .collect(),
            ),
            None => Value::String(String::new()),
        }
    }

    fn convert_tools(&self, tools: Option<&[Tool]>) -> Vec<AnthropicTool> {
        tools
            .unwrap_or_default()
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                input_schema: tool
                    .function
                    .parameters
                    .clone()
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            })
            .collect()
    }

    fn convert_tool_choice(&self, tool_choice: Option<&ToolChoice>) -> Option<AnthropicToolChoice> {
        match tool_choice? {
            ToolChoice::Mode(mode) => match mode.as_str() {
                "auto" => Some(AnthropicToolChoice::Auto),
                "required" | "any" => Some(AnthropicToolChoice::Any),
                _ => None,
            },
            ToolChoice::Named { function, .. } => {
                function.as_ref().map(|f| AnthropicToolChoice::Tool { name: f.name.clone() })
            }
        }
    }

    ///
    /// Client thinking directive, or one derived from a requested effort.
    fn convert_thinking(&self, request: &CanonicalRequest) -> Option<Value> {
        if let Some(thinking) = &request.thinking {
            return Some(thinking.clone());
        }
        let budget = request
            .requested_effort()
            .and_then(ReasoningPolicy::from_effort)
            .and_then(|level| level.budget_tokens())?;
        Some(json!({ "type": "enabled", "budget_tokens": budget }))
    }
}

/* --- helper functions ----------------------------------------------------------------------- */

///
/// Convert a canonical content part; unsupported part types are dropped.
fn convert_part(part: &ContentPart) -> Option<AnthropicContentBlock> {
    match part.part_type.as_str() {
        "text" => part.text.as_ref().map(|text| AnthropicContentBlock::Text { text: text.clone() }),
        "image_url" => part.image_url.as_ref().map(|img| AnthropicContentBlock::Image {
            source: image_source(img.url()),
        }),
        _ => None,
    }
}

///
/// Split `data:<media>;base64,<data>` URLs; everything else is a URL source.
fn image_source(url: &str) -> ImageSource {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((media_type, data)) = rest.split_once(";base64,") {
            return ImageSource::Base64 { media_type: media_type.to_string(), data: data.to_string() };
        }
    }
    ImageSource::Url { url: url.to_string() }
}
