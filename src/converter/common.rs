//!
//! Passthrough transformer for upstreams that already speak the canonical
//! chat-completions protocol.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

use serde_json::{Value, json};

use crate::converter::RequestTransformer;
use crate::converter::canonical::CanonicalRequest;
use crate::converter::policy::{ReasoningPolicy, RequestPolicy};
use crate::error::{ProxyError, Result};
use crate::provider::ProviderFamily;

const PROVIDER: &str = "common";

/// Roles the canonical protocol defines.
const KNOWN_ROLES: [&str; 5] = ["system", "developer", "user", "assistant", "tool"];

///
/// Forwards the canonical body with the resolved model id.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonTransformer;

impl RequestTransformer for CommonTransformer {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Common
    }

    fn transform(&self, request: &CanonicalRequest, model_id: &str) -> Result<Value> {
        if request.messages.is_empty() {
            return Err(ProxyError::transform(PROVIDER, "messages"));
        }
        if let Some(i) = request.messages.iter().position(|m| !KNOWN_ROLES.contains(&m.role.as_str())) {
            return Err(ProxyError::transform(PROVIDER, format!("messages[{}].role", i)));
        }

        let mut body = serde_json::to_value(request)?;
        body["model"] = json!(model_id);
        Ok(body)
    }

    fn apply_policy(&self, body: &mut Value, policy: &RequestPolicy) {
        let Some(obj) = body.as_object_mut() else {
            return;
        };

        if let Some(prompt) = policy.system_prompt() {
            let system = json!({ "role": "system", "content": prompt });
            match obj.get_mut("messages").and_then(Value::as_array_mut) {
                Some(messages) => messages.insert(0, system),
                None => {
                    obj.insert("messages".to_string(), json!([system]));
                }
            }
        }

        match policy.reasoning {
            ReasoningPolicy::Auto => {}
            ReasoningPolicy::Off => {
                obj.remove("reasoning_effort");
                obj.remove("reasoning");
            }
            level => {
                if let Some(effort) = level.effort() {
                    obj.remove("reasoning");
                    obj.insert("reasoning_effort".to_string(), json!(effort));
                }
            }
        }
    }
}
