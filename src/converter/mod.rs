//!
//! Request transformers for every upstream provider family.
//!
//! A transformer reshapes a [CanonicalRequest] into the vendor body for its
//! family and applies the per-model [RequestPolicy]. Transformers are pure:
//! they never mutate their input and never perform I/O.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- modules --------------------------------------------------------------------------------- */

pub mod anthropic;
pub mod canonical;
pub mod common;
pub mod headers;
pub mod policy;
pub mod responses;

/* --- uses ------------------------------------------------------------------------------------ */

use serde_json::Value;

use crate::error::Result;
use crate::provider::ProviderFamily;

pub use anthropic::AnthropicTransformer;
pub use canonical::CanonicalRequest;
pub use common::CommonTransformer;
pub use policy::{ReasoningPolicy, RequestPolicy};
pub use responses::ResponsesTransformer;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Canonical-to-vendor request transformer.
pub trait RequestTransformer: Send + Sync {
    ///
    /// Provider family this transformer targets.
    fn family(&self) -> ProviderFamily;

    ///
    /// Build the vendor request body.
    ///
    /// # Arguments
    ///  * `request` - canonical request as received from the client
    ///  * `model_id` - resolved catalog id sent upstream
    ///
    /// # Returns
    ///  * Vendor body as JSON
    ///  * `ProxyError::Transform` naming the provider family and offending field
    fn transform(&self, request: &CanonicalRequest, model_id: &str) -> Result<Value>;

    ///
    /// Inject system prompt and reasoning policy into a vendor body.
    ///
    /// Works on native vendor bodies too, so the passthrough endpoints share it.
    fn apply_policy(&self, body: &mut Value, policy: &RequestPolicy);
}

/* --- start of code -------------------------------------------------------------------------- */

static ANTHROPIC: AnthropicTransformer = AnthropicTransformer;
static RESPONSES: ResponsesTransformer = ResponsesTransformer;
static COMMON: CommonTransformer = CommonTransformer;

///
/// Transformer for a provider family.
pub fn transformer_for(family: ProviderFamily) -> &'static dyn RequestTransformer {
    match family {
        ProviderFamily::Anthropic => &ANTHROPIC,
        ProviderFamily::OpenAi => &RESPONSES,
        ProviderFamily::Common => &COMMON,
    }
}

///
/// Transform and apply policy in one step.
pub fn build_vendor_body(
    family: ProviderFamily,
    request: &CanonicalRequest,
    model_id: &str,
    policy: &RequestPolicy,
) -> Result<Value> {
    let transformer = transformer_for(family);
    let mut body = transformer.transform(request, model_id)?;
    transformer.apply_policy(&mut body, policy);
    Ok(body)
}

/// Raise a token count to a vendor minimum
pub(crate) fn clamp_min(value: u32, floor: u32) -> u32 {
    if value < floor {
        tracing::debug!("Raising token budget {} to vendor minimum {}", value, floor);
        floor
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformer_families() {
        for family in ProviderFamily::ALL {
            assert_eq!(transformer_for(family).family(), family);
        }
    }

    #[test]
    fn test_clamp_min() {
        assert_eq!(clamp_min(3, 16), 16);
        assert_eq!(clamp_min(512, 16), 512);
    }
}
