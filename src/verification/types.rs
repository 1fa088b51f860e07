// src/verification/types.rs
use serde::{Deserialize, Serialize};

/// One user's request to link their Discord identity to an RDS account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub user_id: String,
    pub user_name: String,
    pub discriminator: String,
    pub avatar_hash: String,
    /// RFC 3339 timestamp of when the user joined the guild
    pub joined_at: String,
    pub channel_id: String,
    pub interaction_token: String,
    pub application_id: String,
}

/// Single-use token handed to the backend and to the user
#[derive(Clone, PartialEq, Eq)]
pub struct UniqueToken(String);

impl UniqueToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for UniqueToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UniqueToken(<redacted>)")
    }
}

/// Claims carried by a service assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Unix timestamp (seconds) after which the assertion is invalid
    pub expiry: i64,
    #[serde(rename = "name")]
    pub issuer: String,
}

/// Compact signed assertion used as a bearer credential
#[derive(Clone)]
pub struct SignedAssertion {
    pub claims: AssertionClaims,
    compact: String,
}

impl SignedAssertion {
    pub(crate) fn new(claims: AssertionClaims, compact: String) -> Self {
        Self { claims, compact }
    }

    pub fn as_str(&self) -> &str {
        &self.compact
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.compact)
    }
}

impl std::fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

/// Classified response of the account linking call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOutcome {
    Created,
    Conflict { status: u16 },
}

impl BackendOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 | 201 => BackendOutcome::Created,
            status => BackendOutcome::Conflict { status },
        }
    }
}
