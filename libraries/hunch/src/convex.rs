//! Utilities for running mutations against a Convex deployment over its HTTP API.
//!
//! This is the one place where a raw response is turned into a [`MutationOutcome`]; nothing downstream
//! should inspect response shapes or error strings.

use std::rc::Rc;

use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use serde_json::json;

use crate::gateway::MutationEndpoint;
use crate::outcome::{Mutation, MutationError, MutationOutcome, RateLimitScope};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ConvexConfig {
    /// e.g. `https://happy-otter-123.convex.cloud`
    pub deployment_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("request error: {0:?}")]
    Request(fetch_happen::Error),

    #[error("HTTP error: {0}")]
    Status(String),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ConvexResponse {
    Success {
        value: serde_json::Value,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
        #[serde(rename = "errorData", default)]
        error_data: Option<serde_json::Value>,
    },
}

pub struct ConvexEndpoint {
    config: ConvexConfig,
    access_token: Rc<dyn Fn() -> Option<String>>,
}

impl ConvexEndpoint {
    pub fn new(config: ConvexConfig, access_token: Rc<dyn Fn() -> Option<String>>) -> Self {
        Self {
            config,
            access_token,
        }
    }
}

impl MutationEndpoint for ConvexEndpoint {
    fn invoke(&self, mutation: &Mutation) -> LocalBoxFuture<'static, MutationOutcome> {
        let url = format!(
            "{}/api/mutation",
            self.config.deployment_url.trim_end_matches('/')
        );
        let payload = json!({
            "path": mutation.name,
            "args": mutation.args,
            "format": "json",
        });
        let access_token = (self.access_token)();
        let name = mutation.name.clone();

        async move {
            match post_mutation(&url, &payload, access_token.as_deref()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Mutation {name} did not complete: {e}");
                    MutationOutcome::Failed(MutationError::transient(e.to_string()))
                }
            }
        }
        .boxed_local()
    }
}

async fn post_mutation(
    url: &str,
    payload: &serde_json::Value,
    access_token: Option<&str>,
) -> Result<MutationOutcome, EndpointError> {
    let client = fetch_happen::Client;
    let mut request = client.post(url).json(payload).map_err(EndpointError::Request)?;
    if let Some(access_token) = access_token {
        request = request.header("Authorization", format!("Bearer {access_token}"));
    }
    let response = request.send().await.map_err(EndpointError::Request)?;

    let ok = response.ok();
    let status = response.status().to_string();
    let body = response.text().await.map_err(EndpointError::Request)?;

    // application errors come back with a JSON body and a non-2xx status, so try the body first
    match outcome_from_body(&body) {
        Ok(outcome) => Ok(outcome),
        Err(_) if !ok => Err(EndpointError::Status(status)),
        Err(e) => Err(e),
    }
}

/// Turn a Convex HTTP API response body into an outcome.
pub fn outcome_from_body(body: &str) -> Result<MutationOutcome, EndpointError> {
    let response: ConvexResponse = serde_json::from_str(body)?;
    Ok(match response {
        ConvexResponse::Success { value } => MutationOutcome::Confirmed(value),
        ConvexResponse::Error {
            error_message,
            error_data,
        } => MutationOutcome::Failed(classify_error(&error_message, error_data.as_ref())),
    })
}

/// Structured `errorData` (`{"kind": "rate_limited", "scope": "hourly"}` and friends) wins.
/// Without it we fall back to guessing from the message.
pub fn classify_error(message: &str, data: Option<&serde_json::Value>) -> MutationError {
    let kind = data
        .and_then(|data| data.get("kind"))
        .and_then(serde_json::Value::as_str);
    match kind {
        Some("rate_limited") => {
            let scope = data
                .and_then(|data| data.get("scope"))
                .and_then(serde_json::Value::as_str);
            match scope {
                Some("hourly" | "hourly_cap") => MutationError::rate_limited(RateLimitScope::HourlyCap),
                _ => MutationError::rate_limited(RateLimitScope::Cooldown),
            }
        }
        Some("verification_required") => MutationError::VerificationRequired,
        Some("unauthenticated") => MutationError::AuthRequired,
        _ => classify_legacy_message(message),
    }
}

/// Substrings older backend versions (and the auth provider) produce when the user still has to verify
/// their email. These are incidental error text, not a contract; delete once every error carries `errorData`.
const LEGACY_VERIFICATION_HINTS: &[&str] = &[
    "invalid redirect",
    "null is not an object",
    "verify your email",
    "email not verified",
];

fn classify_legacy_message(message: &str) -> MutationError {
    let lower = message.to_lowercase();
    if LEGACY_VERIFICATION_HINTS.iter().any(|hint| lower.contains(hint)) {
        log::warn!("Inferred verification-required from error text: {message}");
        return MutationError::VerificationRequired;
    }
    if lower.contains("rate limit") || lower.contains("too many") {
        let scope = if lower.contains("hour") {
            RateLimitScope::HourlyCap
        } else {
            RateLimitScope::Cooldown
        };
        return MutationError::rate_limited(scope);
    }
    if lower.contains("unauthenticated") || lower.contains("not authenticated") {
        return MutationError::AuthRequired;
    }
    MutationError::transient(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_body() {
        let outcome = outcome_from_body(r#"{"status":"success","value":{"liked":true},"logLines":[]}"#)
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Confirmed(json!({"liked": true})));
    }

    #[test]
    fn test_structured_rate_limit() {
        let outcome = outcome_from_body(
            r#"{"status":"error","errorMessage":"Uncaught ConvexError","errorData":{"kind":"rate_limited","scope":"hourly"}}"#,
        )
        .unwrap();
        assert_eq!(
            outcome,
            MutationOutcome::Failed(MutationError::rate_limited(RateLimitScope::HourlyCap))
        );
    }

    #[test]
    fn test_legacy_messages() {
        assert_eq!(
            classify_error("TypeError: null is not an object (evaluating 'x.id')", None),
            MutationError::VerificationRequired
        );
        assert_eq!(
            classify_error("Rate limit exceeded, please wait", None),
            MutationError::rate_limited(RateLimitScope::Cooldown)
        );
        assert_eq!(
            classify_error("boom", None),
            MutationError::transient("boom")
        );
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        assert!(matches!(
            outcome_from_body("<html>bad gateway</html>"),
            Err(EndpointError::Malformed(_))
        ));
    }
}
