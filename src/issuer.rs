//! Session issuance: login, refresh, logout and the session cookie.

use std::sync::Arc;

use time::OffsetDateTime;
use tower_sessions::cookie::{Cookie, SameSite};
use tracing::info;

use crate::claims::Claims;
use crate::config::GateConfig;
use crate::error::{GateError, IssueError};
use crate::store::{session_expiry, SessionRecord, SessionStore, UserDirectory};
use crate::token::TokenSigner;
use crate::validation::{validate_session, validate_user};

/// A freshly issued credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Signed bearer credential, sent to the client.
    pub credential: String,
    /// Claims embedded in `credential`.
    pub claims: Claims,
    /// The session row as written to the store.
    pub session: SessionRecord,
}

/// Creates, refreshes and revokes sessions.
#[derive(Clone)]
pub struct SessionIssuer {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    signer: TokenSigner,
    ttl: time::Duration,
}

impl SessionIssuer {
    /// Creates an issuer writing sessions to `sessions` and deriving claims
    /// from `users`. Credentials and sessions live for `ttl`.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        signer: TokenSigner,
        ttl: time::Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            signer,
            ttl,
        }
    }

    /// Creates an issuer with the configured secret and session lifetime.
    pub fn from_config(
        config: &GateConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self::new(
            sessions,
            users,
            TokenSigner::new(config.token_secret.as_bytes()),
            config.session_ttl,
        )
    }

    /// Starts a session for an already authenticated user.
    ///
    /// Claims are derived from the current user record.
    pub async fn login(&self, user_id: &str) -> Result<IssuedSession, IssueError> {
        let claims = self.current_claims(user_id).await?;
        let now = OffsetDateTime::now_utc();

        let mut session = SessionRecord::new(claims.clone(), now, self.ttl)?;
        validate_session(&session)?;
        self.sessions.create(&mut session).await?;

        let credential = self
            .signer
            .sign(&session.token, &claims, now, session.expires_at)?;

        info!(user_id, "session issued");
        Ok(IssuedSession {
            credential,
            claims,
            session,
        })
    }

    /// Re-derives the claims of a live session from the user record and
    /// issues a new credential for it with a renewed expiry.
    ///
    /// The renewal is conditional on the session still being live when it is
    /// written, so a logout racing with the refresh wins.
    ///
    /// # Errors
    ///
    /// - [`IssueError::Rejected`] if the credential is invalid or the session
    ///   was revoked or expired at any point before the renewal was written
    /// - [`IssueError::UnknownUser`] / [`IssueError::Invalid`] if the owner
    ///   can no longer be turned into claims
    /// - [`IssueError::Store`] on backend failures
    pub async fn refresh(&self, credential: &str) -> Result<IssuedSession, IssueError> {
        let verified = self.signer.verify(credential)?;
        let mut session = self
            .sessions
            .load(&verified.session_id)
            .await?
            .ok_or_else(revoked_or_expired)?;

        let claims = self.current_claims(&session.user_id).await?;
        let now = OffsetDateTime::now_utc();
        session.claims = claims.clone();
        session.updated_at = now;
        session.expires_at = session_expiry(now, self.ttl)?;
        if !self.sessions.renew(&session).await? {
            return Err(revoked_or_expired().into());
        }

        let credential = self
            .signer
            .sign(&session.token, &claims, now, session.expires_at)?;

        info!(user_id = %session.user_id, "session refreshed");
        Ok(IssuedSession {
            credential,
            claims,
            session,
        })
    }

    /// Revokes the session behind `credential`. Revoking twice is a no-op.
    pub async fn logout(&self, credential: &str) -> Result<(), IssueError> {
        let verified = self.signer.verify(credential)?;

        self.sessions
            .revoke(&verified.session_id, OffsetDateTime::now_utc())
            .await?;
        info!("session revoked");
        Ok(())
    }

    async fn current_claims(&self, user_id: &str) -> Result<Claims, IssueError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| IssueError::UnknownUser(user_id.to_string()))?;
        validate_user(&user)?;
        Ok(user.claims())
    }
}

fn revoked_or_expired() -> GateError {
    GateError::ExpiredOrInvalidCredential("session revoked or expired".to_string())
}

/// `Set-Cookie` value carrying `credential`.
pub fn session_cookie(config: &GateConfig, credential: &str) -> String {
    Cookie::build((config.cookie_name.clone(), credential.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(config.session_ttl)
        .build()
        .to_string()
}

/// `Set-Cookie` value clearing the session cookie.
pub fn clear_session_cookie(config: &GateConfig) -> String {
    Cookie::build((config.cookie_name.clone(), String::new()))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Role, SubscriptionStatus};
    use crate::error::ValidationError;
    use crate::memory_store::MemoryStore;
    use crate::store::UserRecord;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    async fn setup() -> (Arc<MemoryStore>, SessionIssuer) {
        let store = Arc::new(MemoryStore::new());
        store
            .put_user(UserRecord {
                id: "u1".into(),
                email: "jane@jobai.dev".into(),
                role: Role::User,
                is_email_verified: false,
                subscription_status: SubscriptionStatus::Inactive,
            })
            .await;
        let issuer = SessionIssuer::from_config(&GateConfig::new(SECRET), store.clone(), store.clone());
        (store, issuer)
    }

    #[tokio::test]
    async fn login_snapshots_the_user_record() {
        let (store, issuer) = setup().await;
        let issued = issuer.login("u1").await.unwrap();

        assert!(!issued.claims.is_email_verified);
        assert_eq!(issued.session.user_id, "u1");
        assert!(store.load(&issued.session.token).await.unwrap().is_some());

        let verified = TokenSigner::new(SECRET.as_bytes())
            .verify(&issued.credential)
            .unwrap();
        assert_eq!(verified.session_id, issued.session.token);
        assert_eq!(verified.claims, issued.claims);
        assert_eq!(verified.expires_at, issued.session.expires_at.unix_timestamp());
    }

    #[tokio::test]
    async fn unknown_and_invalid_users_cannot_log_in() {
        let (store, issuer) = setup().await;
        assert!(matches!(
            issuer.login("nobody").await,
            Err(IssueError::UnknownUser(_))
        ));

        store
            .put_user(UserRecord {
                id: "u2".into(),
                email: "not-an-email".into(),
                role: Role::User,
                is_email_verified: true,
                subscription_status: SubscriptionStatus::Active,
            })
            .await;
        assert!(matches!(issuer.login("u2").await, Err(IssueError::Invalid(_))));
    }

    #[tokio::test]
    async fn refresh_picks_up_changed_flags() {
        let (store, issuer) = setup().await;
        let issued = issuer.login("u1").await.unwrap();

        store
            .put_user(UserRecord {
                id: "u1".into(),
                email: "jane@jobai.dev".into(),
                role: Role::User,
                is_email_verified: true,
                subscription_status: SubscriptionStatus::Active,
            })
            .await;

        let refreshed = issuer.refresh(&issued.credential).await.unwrap();
        assert_eq!(refreshed.session.token, issued.session.token);
        assert!(refreshed.claims.is_email_verified);
        assert!(refreshed.claims.is_subscribed());

        let stored = store.load(&issued.session.token).await.unwrap().unwrap();
        assert_eq!(stored.claims, refreshed.claims);
    }

    #[tokio::test]
    async fn logout_revokes_and_blocks_refresh() {
        let (store, issuer) = setup().await;
        let issued = issuer.login("u1").await.unwrap();

        issuer.logout(&issued.credential).await.unwrap();
        // Idempotent
        issuer.logout(&issued.credential).await.unwrap();

        assert!(store.load(&issued.session.token).await.unwrap().is_none());
        assert!(matches!(
            issuer.refresh(&issued.credential).await,
            Err(IssueError::Rejected(_))
        ));
        assert!(issuer.logout("garbage").await.is_err());
    }

    /// Directory that logs the session out while the refresh is reading
    /// the user record.
    struct LogoutDuringLookup {
        store: Arc<MemoryStore>,
        token: String,
    }

    #[async_trait::async_trait]
    impl UserDirectory for LogoutDuringLookup {
        async fn find_user(
            &self,
            user_id: &str,
        ) -> Result<Option<UserRecord>, crate::error::StoreError> {
            self.store
                .revoke(&self.token, OffsetDateTime::now_utc())
                .await?;
            self.store.find_user(user_id).await
        }
    }

    #[tokio::test]
    async fn logout_racing_a_refresh_wins() {
        let (store, issuer) = setup().await;
        let issued = issuer.login("u1").await.unwrap();

        let racing = SessionIssuer::new(
            store.clone(),
            Arc::new(LogoutDuringLookup {
                store: store.clone(),
                token: issued.session.token.clone(),
            }),
            TokenSigner::new(SECRET.as_bytes()),
            time::Duration::hours(1),
        );

        assert!(matches!(
            racing.refresh(&issued.credential).await,
            Err(IssueError::Rejected(GateError::ExpiredOrInvalidCredential(_)))
        ));
        assert!(store.load(&issued.session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn out_of_range_lifetimes_are_errors() {
        let (store, issuer) = setup().await;
        let issued = issuer.login("u1").await.unwrap();

        let endless = SessionIssuer::new(
            store.clone(),
            store.clone(),
            TokenSigner::new(SECRET.as_bytes()),
            time::Duration::MAX,
        );
        assert!(matches!(
            endless.login("u1").await,
            Err(IssueError::Invalid(ValidationError::ExpiryOutOfRange))
        ));
        assert!(matches!(
            endless.refresh(&issued.credential).await,
            Err(IssueError::Invalid(ValidationError::ExpiryOutOfRange))
        ));
        // The failed refresh left the session untouched
        let stored = store.load(&issued.session.token).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, issued.session.expires_at);
    }

    #[test]
    fn cookies_are_http_only() {
        let config = GateConfig::new(SECRET);
        let cookie = session_cookie(&config, "abc");
        assert!(cookie.starts_with("jobai_session=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));

        let cleared = clear_session_cookie(&config);
        assert!(cleared.contains("Max-Age=0"));
    }
}
