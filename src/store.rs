//! Storage seams: session records and the user lookup the issuer relies on.

use async_trait::async_trait;
use time::OffsetDateTime;
use tower_sessions::session::Id;

use crate::claims::{Claims, Role, SubscriptionStatus};
use crate::error::{StoreError, ValidationError};

/// A persisted session.
///
/// Valid iff `now < expires_at` and it has not been revoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Opaque session id embedded in the credential.
    pub token: String,
    /// Owner of the session.
    pub user_id: String,
    /// Claims the most recent credential for this session was issued with.
    pub claims: Claims,
    /// End of the session's lifetime, moved forward on every refresh.
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    /// Time of the last refresh or revocation.
    pub updated_at: OffsetDateTime,
    /// Set once by logout and never cleared.
    pub revoked_at: Option<OffsetDateTime>,
}

impl SessionRecord {
    /// A fresh session for `claims.user_id` lasting `ttl` from `now`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::ExpiryOutOfRange`] when `now + ttl` is not a
    /// representable date.
    pub fn new(
        claims: Claims,
        now: OffsetDateTime,
        ttl: time::Duration,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            token: new_session_token(),
            user_id: claims.user_id.clone(),
            claims,
            expires_at: session_expiry(now, ttl)?,
            created_at: now,
            updated_at: now,
            revoked_at: None,
        })
    }

    /// Whether the session is neither revoked nor expired at `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

/// Live user flags read when claims are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    /// Must pass [`crate::validation::validate_email`] before claims are issued.
    pub email: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub subscription_status: SubscriptionStatus,
}

impl UserRecord {
    /// Snapshot of the authorization-relevant flags.
    pub fn claims(&self) -> Claims {
        Claims {
            user_id: self.id.clone(),
            role: self.role,
            is_email_verified: self.is_email_verified,
            subscription_status: self.subscription_status,
        }
    }
}

/// Random, URL-safe session id.
pub fn new_session_token() -> String {
    Id::default().to_string()
}

/// `now + ttl`, or [`ValidationError::ExpiryOutOfRange`] on overflow.
pub fn session_expiry(
    now: OffsetDateTime,
    ttl: time::Duration,
) -> Result<OffsetDateTime, ValidationError> {
    now.checked_add(ttl).ok_or(ValidationError::ExpiryOutOfRange)
}

/// Backend holding session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts `record`. If its token collides with an existing one a new
    /// token is generated and written back into `record`.
    async fn create(&self, record: &mut SessionRecord) -> Result<(), StoreError>;

    /// Inserts or replaces `record`.
    ///
    /// A revocation already stored is kept even when `record.revoked_at` is
    /// `None`; a saved session can never come back to life.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Writes the claims, expiry and update time of `record`, but only if the
    /// stored session is still unrevoked and unexpired at the moment of the
    /// write.
    ///
    /// # Returns
    ///
    /// `true` if the session was renewed, `false` if it was revoked, expired or
    /// missing.
    async fn renew(&self, record: &SessionRecord) -> Result<bool, StoreError>;

    /// Loads a session that is neither expired nor revoked.
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Marks a session revoked. Revoking an unknown or revoked session is a no-op.
    async fn revoke(&self, token: &str, at: OffsetDateTime) -> Result<(), StoreError>;

    /// Physically removes expired sessions, returning how many were removed.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

/// Read-only access to user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user by id. `Ok(None)` when no such user exists.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
}
