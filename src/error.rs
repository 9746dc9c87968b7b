//! Error types for the access gate and its collaborators.
//!
//! Gate errors never escape to the caller as a failure: the gate turns every
//! [`GateError`] into a redirect. The remaining error types belong to the
//! session store, the credential issuer, configuration loading and record
//! validation.

use thiserror::Error;

/// Why the gate refused to let a request through.
///
/// Every variant is translated into a redirect at the boundary. None of them
/// is ever treated as "allow".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The request carried no credential at all.
    #[error("no credential presented")]
    NoCredential,

    /// The credential failed signature, expiry or revocation checks.
    #[error("credential expired or invalid: {0}")]
    ExpiredOrInvalidCredential(String),

    /// The credential is valid but the email address is not verified.
    #[error("email address not verified")]
    InsufficientVerification,

    /// The credential is valid but the subscription is not active.
    #[error("subscription not active")]
    InsufficientSubscription,

    /// The session store could not be reached in time. The gate fails closed.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

impl GateError {
    /// Whether the failure is transient and a retry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::StoreUnavailable(_))
    }
}

/// Session store error, split the same way database-backed stores split them.
///
/// - Database errors → [`StoreError::Backend`]
/// - MessagePack serialization errors → [`StoreError::Encode`]
/// - MessagePack deserialization errors → [`StoreError::Decode`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("failed to encode session claims: {0}")]
    Encode(String),

    #[error("failed to decode session claims: {0}")]
    Decode(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Errors raised while issuing, refreshing or revoking credentials.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("credential rejected: {0}")]
    Rejected(#[from] GateError),

    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to sign credential: {0}")]
    Signing(String),
}

/// Errors raised while loading [`crate::GateConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// A persisted record failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("malformed email address: {0}")]
    Email(String),

    #[error("session expires before it was created")]
    ExpiryBeforeCreation,

    #[error("session lifetime out of range")]
    ExpiryOutOfRange,
}
