//!
//! Outbound header builder.
//!
//! Merges the resolved credential, the provider routing tag, vendor protocol
//! headers and a small allow-list of client diagnostic headers. The client's
//! own `authorization` and `x-api-key` are never forwarded.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::credentials::Credential;
use crate::provider::ProviderFamily;

/* --- constants ------------------------------------------------------------------------------- */

/** routing tag header understood by the upstream gateway */
pub const PROVIDER_HEADER: &str = "x-relaymux-provider";

/** resolved model id, for upstream-side accounting */
pub const MODEL_HEADER: &str = "x-relaymux-model";

/** Anthropic protocol version */
const ANTHROPIC_VERSION: &str = "2023-06-01";

/** client headers copied to the upstream request */
const PASSTHROUGH_HEADERS: [&str; 4] = ["session_id", "x-session-id", "x-client-name", "x-request-id"];

/* --- types ----------------------------------------------------------------------------------- */

///
/// Inputs of [build_headers].
pub struct HeaderParams<'a> {
    pub credential: &'a Credential,
    pub client_headers: &'a HeaderMap,
    pub is_streaming: bool,
    pub model_id: &'a str,
    /** routing tag from the model catalog */
    pub provider: &'a str,
    pub family: ProviderFamily,
    /** outbound identification string */
    pub user_agent: &'a str,
}

/* --- start of code -------------------------------------------------------------------------- */

///
/// Build the header set for one upstream request.
///
/// # Arguments
///  * `params` - credential, client headers and routing information
///
/// # Returns
///  * Header map ready for the dispatcher
pub fn build_headers(params: &HeaderParams<'_>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    set_authorization(&mut headers, &params.credential.secret);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(if params.is_streaming {
            "text/event-stream"
        } else {
            "application/json"
        }),
    );

    insert_str(&mut headers, USER_AGENT, params.user_agent);
    insert_str(&mut headers, HeaderName::from_static(PROVIDER_HEADER), params.provider);
    insert_str(&mut headers, HeaderName::from_static(MODEL_HEADER), params.model_id);

    if params.family == ProviderFamily::Anthropic {
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        if let Some(beta) = params.client_headers.get("anthropic-beta") {
            headers.insert(HeaderName::from_static("anthropic-beta"), beta.clone());
        }
    }

    for name in PASSTHROUGH_HEADERS {
        if let Some(value) = params.client_headers.get(name) {
            headers.insert(HeaderName::from_static(name), value.clone());
        }
    }

    headers
}

///
/// Replace the Authorization header with a bearer value for `secret`.
///
/// Secrets that are not valid header values leave the header absent; the
/// upstream then answers 401 and the pool rotates past the broken entry.
pub fn set_authorization(headers: &mut HeaderMap, secret: &str) {
    match HeaderValue::from_str(&format!("Bearer {}", secret)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::warn!("Credential contains characters not allowed in headers; skipping");
            headers.remove(AUTHORIZATION);
        }
    }
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
