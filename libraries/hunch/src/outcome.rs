//! Results of writes against the backing store, decided once at the integration boundary.

use std::fmt;

/// One named write, e.g. `likes:toggle` with `{"entryId": "..."}`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mutation {
    pub name: String,
    pub args: serde_json::Value,
}

impl Mutation {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// The same action was repeated too quickly.
    Cooldown,
    /// Too many actions in the last hour.
    HourlyCap,
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitScope::Cooldown => f.write_str("per-action cooldown"),
            RateLimitScope::HourlyCap => f.write_str("hourly cap"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationError {
    /// Resolved by sending the user to sign in, never shown as an error.
    #[error("sign-in required")]
    AuthRequired,

    #[error("rate limited ({scope})")]
    RateLimited { scope: RateLimitScope },

    #[error("email verification required")]
    VerificationRequired,

    #[error("write failed: {message}")]
    TransientWriteFailure { message: String },
}

impl MutationError {
    pub fn transient(message: impl Into<String>) -> Self {
        MutationError::TransientWriteFailure {
            message: message.into(),
        }
    }

    pub fn rate_limited(scope: RateLimitScope) -> Self {
        MutationError::RateLimited { scope }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MutationOutcome {
    Confirmed(serde_json::Value),
    Failed(MutationError),
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationOutcome::Confirmed(_))
    }
}

impl From<Result<serde_json::Value, MutationError>> for MutationOutcome {
    fn from(result: Result<serde_json::Value, MutationError>) -> Self {
        match result {
            Ok(value) => MutationOutcome::Confirmed(value),
            Err(error) => MutationOutcome::Failed(error),
        }
    }
}
