//!
//! Per-model request policy.
//!
//! A [RequestPolicy] is resolved from the model catalog for every request and
//! applied to the vendor body after transformation: system prompt injection
//! and reasoning overrides. Each provider family encodes reasoning its own
//! way; this module only holds the shared vocabulary.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde::{Deserialize, Serialize};

/* --- constants ------------------------------------------------------------------------------- */

/** thinking budget for the `low` level */
pub const LOW_BUDGET_TOKENS: u32 = 4096;
/** thinking budget for the `medium` level */
pub const MEDIUM_BUDGET_TOKENS: u32 = 12288;
/** thinking budget for the `high` level */
pub const HIGH_BUDGET_TOKENS: u32 = 24576;

/** summary mode sent alongside an effort level */
pub const REASONING_SUMMARY_MODE: &str = "auto";

/* --- types ----------------------------------------------------------------------------------- */

///
/// Reasoning override configured per model.
///
/// `Auto` leaves whatever the client sent, `Off` strips it, the levels
/// overwrite it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningPolicy {
    #[default]
    Auto,
    Off,
    Low,
    Medium,
    High,
}

///
/// Policy applied to one outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPolicy {
    /** prompt prepended to the vendor's system-carrying field */
    pub system_prompt: Option<String>,
    pub reasoning: ReasoningPolicy,
}

/* --- start of code -------------------------------------------------------------------------- */

impl ReasoningPolicy {
    ///
    /// Level name for effort-style encodings; `None` for `auto` and `off`.
    pub fn effort(&self) -> Option<&'static str> {
        match self {
            ReasoningPolicy::Low => Some("low"),
            ReasoningPolicy::Medium => Some("medium"),
            ReasoningPolicy::High => Some("high"),
            ReasoningPolicy::Auto | ReasoningPolicy::Off => None,
        }
    }

    ///
    /// Thinking budget for budget-token encodings; `None` for `auto` and `off`.
    pub fn budget_tokens(&self) -> Option<u32> {
        match self {
            ReasoningPolicy::Low => Some(LOW_BUDGET_TOKENS),
            ReasoningPolicy::Medium => Some(MEDIUM_BUDGET_TOKENS),
            ReasoningPolicy::High => Some(HIGH_BUDGET_TOKENS),
            ReasoningPolicy::Auto | ReasoningPolicy::Off => None,
        }
    }

    ///
    /// Parse a client-supplied effort string (`low`, `medium`, `high`).
    ///
    /// Anything else (including `minimal` and `none`) yields `None`.
    pub fn from_effort(effort: &str) -> Option<Self> {
        match effort.trim().to_ascii_lowercase().as_str() {
            "low" => Some(ReasoningPolicy::Low),
            "medium" => Some(ReasoningPolicy::Medium),
            "high" => Some(ReasoningPolicy::High),
            _ => None,
        }
    }
}

impl RequestPolicy {
    /// Policy with nothing to inject
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// System prompt, if configured and non-blank
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_table() {
        assert_eq!(ReasoningPolicy::Low.budget_tokens(), Some(4096));
        assert_eq!(ReasoningPolicy::Medium.budget_tokens(), Some(12288));
        assert_eq!(ReasoningPolicy::High.budget_tokens(), Some(24576));
        assert_eq!(ReasoningPolicy::Off.budget_tokens(), None);
        assert_eq!(ReasoningPolicy::Auto.effort(), None);
    }

    #[test]
    fn test_from_effort() {
        assert_eq!(ReasoningPolicy::from_effort(" HIGH "), Some(ReasoningPolicy::High));
        assert_eq!(ReasoningPolicy::from_effort("minimal"), None);
    }

    #[test]
    fn test_blank_prompt_is_ignored() {
        let policy = RequestPolicy { system_prompt: Some("  ".to_string()), ..Default::default() };
        assert!(policy.system_prompt().is_none());
    }
}
