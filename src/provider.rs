//!
//! Model catalog and provider families.
//!
//! Every configured model belongs to one [ProviderFamily], which decides the
//! wire protocol used upstream. Request handlers resolve models, endpoints and
//! policy through the [ModelCatalog] trait; [ConfigCatalog] answers from the
//! loaded configuration.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::converter::policy::ReasoningPolicy;

/* --- provider family ------------------------------------------------------------------------- */

///
/// Upstream wire protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    /// Anthropic-style messages protocol.
    Anthropic,
    /// OpenAI-style responses protocol.
    #[serde(rename = "openai")]
    OpenAi,
    /// Canonical chat-completions protocol forwarded as is.
    Common,
}

impl ProviderFamily {
    pub const ALL: [ProviderFamily; 3] =
        [ProviderFamily::Anthropic, ProviderFamily::OpenAi, ProviderFamily::Common];

    ///
    /// Configuration name of the family (`type = "..."`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Common => "common",
        }
    }

    ///
    /// API path appended to the endpoint base URL when none is configured.
    pub fn default_path(&self) -> &'static str {
        match self {
            ProviderFamily::Anthropic => "/v1/messages",
            ProviderFamily::OpenAi => "/v1/responses",
            ProviderFamily::Common => "/v1/chat/completions",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* --- catalog types --------------------------------------------------------------------------- */

///
/// Resolved model entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub family: ProviderFamily,
    /** routing tag forwarded upstream, defaults to the family name */
    pub provider: String,
}

///
/// Resolved upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub path: String,
}

impl Endpoint {
    /// Full request URL
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

///
/// Entry of the public model listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedModel {
    pub id: String,
    pub owned_by: String,
    pub display_name: Option<String>,
}

/* --- catalog trait --------------------------------------------------------------------------- */

///
/// Read-only lookup over the static model configuration.
pub trait ModelCatalog: fmt::Debug + Send + Sync {
    ///
    /// Map a client-supplied model id to a catalog id, following redirects.
    ///
    /// Returns `None` when the id is neither a catalog entry nor a redirect.
    fn resolve_model(&self, raw_id: &str) -> Option<String>;

    ///
    /// Catalog entry for a resolved id.
    fn get_model(&self, model_id: &str) -> Option<ModelInfo>;

    ///
    /// Endpoint configured for a provider family.
    fn get_endpoint(&self, family: ProviderFamily) -> Option<Endpoint>;

    ///
    /// Reasoning policy for a resolved id; `Auto` when unknown.
    fn reasoning_policy(&self, model_id: &str) -> ReasoningPolicy;

    ///
    /// Configured system prompt, `None` when unset.
    fn system_prompt(&self) -> Option<String>;

    ///
    /// Models exposed by the listing endpoint (catalog entries and redirect aliases).
    fn list_models(&self) -> Vec<ListedModel>;
}

/* --- config-backed catalog ------------------------------------------------------------------- */

///
/// Catalog answering from the loaded [Config].
#[derive(Debug, Clone)]
pub struct ConfigCatalog {
    config: Arc<Config>,
}

impl ConfigCatalog {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl ModelCatalog for ConfigCatalog {
    fn resolve_model(&self, raw_id: &str) -> Option<String> {
        let raw_id = raw_id.trim();
        if raw_id.is_empty() {
            return None;
        }
        // a redirect wins over a same-named catalog entry
        if let Some(target) = self.config.redirects.get(raw_id) {
            return self.config.models.contains_key(target).then(|| target.clone());
        }
        self.config.models.contains_key(raw_id).then(|| raw_id.to_string())
    }

    fn get_model(&self, model_id: &str) -> Option<ModelInfo> {
        self.config.models.get(model_id).map(|m| ModelInfo {
            family: m.family,
            provider: m.provider.clone().unwrap_or_else(|| m.family.as_str().to_string()),
        })
    }

    fn get_endpoint(&self, family: ProviderFamily) -> Option<Endpoint> {
        self.config.endpoints.get(family).map(|e| Endpoint {
            base_url: e.base_url.clone(),
            path: e.path.clone().unwrap_or_else(|| family.default_path().to_string()),
        })
    }

    fn reasoning_policy(&self, model_id: &str) -> ReasoningPolicy {
        self.config.models.get(model_id).map(|m| m.reasoning).unwrap_or_default()
    }

    fn system_prompt(&self) -> Option<String> {
        self.config.system_prompt().map(str::to_string)
    }

    fn list_models(&self) -> Vec<ListedModel> {
        let owner = |id: &str| {
            self.get_model(id).map(|m| m.provider).unwrap_or_else(|| "relaymux".to_string())
        };

        let mut listed: Vec<ListedModel> = self
            .config
            .models
            .iter()
            .map(|(id, m)| ListedModel {
                id: id.clone(),
                owned_by: owner(id),
                display_name: m.display_name.clone(),
            })
            .collect();

        listed.extend(self.config.redirects.iter().map(|(alias, target)| ListedModel {
            id: alias.clone(),
            owned_by: owner(target),
            display_name: None,
        }));

        listed
    }
}
