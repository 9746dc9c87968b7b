//! The request-time access decision.
//!
//! [`AccessGate::decide`] is a pure function of the path and the resolved
//! credential. [`AccessGate::resolve`] turns the presented credential into
//! claims, optionally re-checking the session store for revocation.
//! [`AccessGate::evaluate`] runs both.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::access::{path_has_prefix, AccessLevel, PathTable, Redirects};
use crate::claims::Claims;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::store::SessionStore;
use crate::token::TokenSigner;

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Hand the request to the route handler.
    Continue,
    /// Send the caller to `target`. When `preserve_original_path` is set the
    /// requested path travels along as the return parameter.
    RedirectTo {
        target: String,
        preserve_original_path: bool,
    },
}

impl Decision {
    /// The `Location` value for a redirect, `None` for [`Decision::Continue`].
    pub fn location(&self, original_path: &str, redirects: &Redirects) -> Option<String> {
        match self {
            Decision::Continue => None,
            Decision::RedirectTo {
                target,
                preserve_original_path: true,
            } => Some(redirects.with_return(target, original_path)),
            Decision::RedirectTo { target, .. } => Some(target.clone()),
        }
    }
}

/// Full result of [`AccessGate::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// What the middleware does with the request.
    pub decision: Decision,
    /// Claims of a valid credential, present even when the request is redirected.
    pub claims: Option<Claims>,
    /// Why the request was redirected.
    pub denial: Option<GateError>,
}

/// Decides, per request, whether the caller may reach a path.
///
/// The gate holds no per-request state; the same input always produces the
/// same decision.
#[derive(Clone)]
pub struct AccessGate {
    table: PathTable,
    redirects: Redirects,
    signer: TokenSigner,
    store: Option<Arc<dyn SessionStore>>,
    store_timeout: Duration,
}

impl AccessGate {
    /// Creates a gate that trusts signed credentials without store revalidation.
    ///
    /// # Parameters
    ///
    /// * `signer` - Verifies presented credentials.
    /// * `table` - Maps request paths to the required [`AccessLevel`].
    /// * `redirects` - Pages denied requests are sent to.
    ///
    /// # Returns
    ///
    /// A gate without a session store. Add one with
    /// [`AccessGate::with_revalidation`] to honor logouts before credential expiry.
    pub fn new(signer: TokenSigner, table: PathTable, redirects: Redirects) -> Self {
        Self {
            table,
            redirects,
            signer,
            store: None,
            store_timeout: Duration::from_millis(500),
        }
    }

    /// Builds a gate with the canonical path table and the configured redirects.
    /// `store` is consulted for revocation only when the configuration asks for it.
    pub fn from_config(config: &GateConfig, store: Arc<dyn SessionStore>) -> Self {
        let gate = Self::new(
            TokenSigner::new(config.token_secret.as_bytes()),
            PathTable::jobai(),
            config.redirects.clone(),
        );
        if config.revalidate_sessions {
            gate.with_revalidation(store, config.store_timeout)
        } else {
            gate
        }
    }

    /// Re-checks every credential against `store`, waiting at most `timeout`.
    pub fn with_revalidation(mut self, store: Arc<dyn SessionStore>, timeout: Duration) -> Self {
        self.store = Some(store);
        self.store_timeout = timeout;
        self
    }

    /// The level `path` requires under this gate's table.
    pub fn classify(&self, path: &str) -> AccessLevel {
        self.table.classify(path)
    }

    pub fn redirects(&self) -> &Redirects {
        &self.redirects
    }

    /// Resolves the presented credential into claims.
    ///
    /// A missing, malformed, expired or revoked credential is an error, as is
    /// an unreachable store. Callers never get claims they could not verify.
    pub async fn resolve(&self, credential: Option<&str>) -> Result<Claims, GateError> {
        let token = match credential {
            Some(token) if !token.trim().is_empty() => token.trim(),
            _ => return Err(GateError::NoCredential),
        };

        let verified = self.signer.verify(token)?;

        if let Some(store) = &self.store {
            let session =
                match tokio::time::timeout(self.store_timeout, store.load(&verified.session_id))
                    .await
                {
                    Err(_) => {
                        warn!(timeout = ?self.store_timeout, "session store timed out");
                        return Err(GateError::StoreUnavailable("timed out".to_string()));
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "session store unavailable");
                        return Err(GateError::StoreUnavailable(e.to_string()));
                    }
                    Ok(Ok(session)) => session,
                };

            match session {
                Some(session) if session.user_id == verified.claims.user_id => {}
                Some(_) => {
                    return Err(GateError::ExpiredOrInvalidCredential(
                        "session belongs to another user".to_string(),
                    ))
                }
                None => {
                    return Err(GateError::ExpiredOrInvalidCredential(
                        "session revoked or expired".to_string(),
                    ))
                }
            }
        }

        Ok(verified.claims)
    }

    /// The decision for `path` given the outcome of credential resolution.
    ///
    /// Rules, first match wins:
    /// 1. public paths continue;
    /// 2. no valid credential redirects to login, keeping the path;
    /// 3. unverified email redirects to the verification page, unless the
    ///    request is for that page;
    /// 4. an inactive subscription on a subscriber path redirects to the
    ///    subscription page;
    /// 5. everything else continues.
    pub fn decide(&self, path: &str, credential: Result<&Claims, &GateError>) -> Decision {
        match self.check(self.classify(path), path, credential) {
            Ok(()) => Decision::Continue,
            Err(denial) => self.redirect_for(&denial),
        }
    }

    /// Resolves the credential and decides. The store is only consulted for
    /// paths that are not public.
    pub async fn authorize(&self, path: &str, credential: Option<&str>) -> Outcome {
        let level = self.classify(path);
        if level == AccessLevel::Public {
            return Outcome {
                decision: Decision::Continue,
                claims: None,
                denial: None,
            };
        }

        let resolved = self.resolve(credential).await;
        match self.check(level, path, resolved.as_ref()) {
            Ok(()) => Outcome {
                decision: Decision::Continue,
                claims: resolved.ok(),
                denial: None,
            },
            Err(denial) => {
                debug!(path, ?level, reason = %denial, "request denied");
                Outcome {
                    decision: self.redirect_for(&denial),
                    claims: resolved.ok(),
                    denial: Some(denial),
                }
            }
        }
    }

    /// [`AccessGate::authorize`] without the claims and the denial reason.
    pub async fn evaluate(&self, path: &str, credential: Option<&str>) -> Decision {
        self.authorize(path, credential).await.decision
    }

    fn check(
        &self,
        level: AccessLevel,
        path: &str,
        credential: Result<&Claims, &GateError>,
    ) -> Result<(), GateError> {
        if level == AccessLevel::Public {
            return Ok(());
        }

        let claims = credential.map_err(Clone::clone)?;

        if level >= AccessLevel::Verified
            && !claims.is_email_verified
            && !path_has_prefix(path, &self.redirects.verify_email)
        {
            return Err(GateError::InsufficientVerification);
        }

        if level == AccessLevel::Subscribed && !claims.is_subscribed() {
            return Err(GateError::InsufficientSubscription);
        }

        Ok(())
    }

    fn redirect_for(&self, denial: &GateError) -> Decision {
        match denial {
            GateError::InsufficientVerification => Decision::RedirectTo {
                target: self.redirects.verify_email.clone(),
                preserve_original_path: false,
            },
            GateError::InsufficientSubscription => Decision::RedirectTo {
                target: self.redirects.subscription.clone(),
                preserve_original_path: false,
            },
            // Every credential or store failure lands on login
            GateError::NoCredential
            | GateError::ExpiredOrInvalidCredential(_)
            | GateError::StoreUnavailable(_) => Decision::RedirectTo {
                target: self.redirects.login.clone(),
                preserve_original_path: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Role, SubscriptionStatus};
    use crate::error::StoreError;
    use crate::memory_store::MemoryStore;
    use crate::store::{SessionRecord, UserRecord};
    use async_trait::async_trait;
    use time::OffsetDateTime;

    const SECRET: &[u8] = b"test-secret";

    fn gate() -> AccessGate {
        AccessGate::new(
            TokenSigner::new(SECRET),
            PathTable::jobai(),
            Redirects::default(),
        )
    }

    fn claims(verified: bool, status: SubscriptionStatus) -> Claims {
        Claims {
            user_id: "u1".into(),
            role: Role::User,
            is_email_verified: verified,
            subscription_status: status,
        }
    }

    fn credential(claims: &Claims, session_id: &str) -> String {
        let now = OffsetDateTime::now_utc();
        TokenSigner::new(SECRET)
            .sign(session_id, claims, now, now + time::Duration::hours(1))
            .unwrap()
    }

    fn login_redirect() -> Decision {
        Decision::RedirectTo {
            target: "/login".into(),
            preserve_original_path: true,
        }
    }

    #[tokio::test]
    async fn public_paths_continue_regardless_of_credential() {
        let gate = gate();
        let token = credential(&claims(false, SubscriptionStatus::Inactive), "s1");
        for path in ["/", "/api/auth/providers", "/login", "/auth/callback", "/pricing"] {
            assert_eq!(gate.evaluate(path, None).await, Decision::Continue);
            assert_eq!(gate.evaluate(path, Some("garbage")).await, Decision::Continue);
            assert_eq!(gate.evaluate(path, Some(&token)).await, Decision::Continue);
        }
    }

    #[tokio::test]
    async fn missing_or_invalid_credentials_go_to_login_with_return_path() {
        let gate = gate();
        for path in ["/app/profile", "/dashboard", "/verify-email", "/premium/x"] {
            let decision = gate.evaluate(path, None).await;
            assert_eq!(decision, login_redirect());
            assert_eq!(gate.evaluate(path, Some("not-a-jwt")).await, login_redirect());
            assert_eq!(gate.evaluate(path, Some("  ")).await, login_redirect());
        }

        let decision = gate.evaluate("/app/profile", None).await;
        assert_eq!(
            decision.location("/app/profile", gate.redirects()).as_deref(),
            Some("/login?redirect=%2Fapp%2Fprofile")
        );

        let custom = Redirects {
            return_param: "next".into(),
            ..Redirects::default()
        };
        assert_eq!(
            decision.location("/app/profile", &custom),
            Some(custom.login_with_return("/app/profile"))
        );
        assert_eq!(Decision::Continue.location("/app/profile", &custom), None);
    }

    #[tokio::test]
    async fn expired_credentials_are_treated_as_absent() {
        let gate = gate();
        let now = OffsetDateTime::now_utc();
        let expired = TokenSigner::new(SECRET)
            .sign(
                "s1",
                &claims(true, SubscriptionStatus::Active),
                now - time::Duration::hours(2),
                now - time::Duration::hours(1),
            )
            .unwrap();

        let outcome = gate.authorize("/app/profile", Some(&expired)).await;
        assert_eq!(outcome.decision, login_redirect());
        assert!(matches!(
            outcome.denial,
            Some(GateError::ExpiredOrInvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn unverified_users_go_to_verify_email() {
        let gate = gate();
        let token = credential(&claims(false, SubscriptionStatus::Active), "s1");

        let decision = gate.evaluate("/app/profile", Some(&token)).await;
        assert_eq!(
            decision,
            Decision::RedirectTo {
                target: "/verify-email".into(),
                preserve_original_path: false,
            }
        );
        assert_eq!(
            decision.location("/app/profile", gate.redirects()).as_deref(),
            Some("/verify-email")
        );

        // No loop on the verification page itself
        assert_eq!(gate.evaluate("/verify-email", Some(&token)).await, Decision::Continue);
    }

    #[test]
    fn verification_page_is_exempt_even_when_protected_harder() {
        let gate = AccessGate::new(
            TokenSigner::new(SECRET),
            PathTable::jobai().with_rule("/verify-email", AccessLevel::Verified),
            Redirects::default(),
        );
        let unverified = claims(false, SubscriptionStatus::Active);
        assert_eq!(
            gate.decide("/verify-email", Ok(&unverified)),
            Decision::Continue
        );
    }

    #[tokio::test]
    async fn inactive_subscriptions_go_to_subscription_page() {
        let gate = gate();
        let token = credential(&claims(true, SubscriptionStatus::Inactive), "s1");

        assert_eq!(
            gate.evaluate("/app/profile", Some(&token)).await,
            Decision::RedirectTo {
                target: "/subscription".into(),
                preserve_original_path: false,
            }
        );
        // Verified-only paths do not care about the subscription
        assert_eq!(gate.evaluate("/dashboard", Some(&token)).await, Decision::Continue);
        assert_eq!(gate.evaluate("/subscription", Some(&token)).await, Decision::Continue);
    }

    #[tokio::test]
    async fn fully_entitled_users_continue_and_claims_are_exposed() {
        let gate = gate();
        let entitled = claims(true, SubscriptionStatus::Active);
        let token = credential(&entitled, "s1");

        let outcome = gate.authorize("/premium/insights", Some(&token)).await;
        assert_eq!(outcome.decision, Decision::Continue);
        assert_eq!(outcome.claims, Some(entitled));
        assert_eq!(outcome.denial, None);
    }

    #[tokio::test]
    async fn evaluation_is_idempotent() {
        let gate = gate();
        let token = credential(&claims(true, SubscriptionStatus::PastDue), "s1");
        for path in ["/app", "/dashboard", "/", "/login"] {
            let first = gate.authorize(path, Some(&token)).await;
            let second = gate.authorize(path, Some(&token)).await;
            assert_eq!(first, second);
        }
    }

    #[test]
    fn decide_handles_every_denial_reason() {
        let gate = gate();
        assert_eq!(
            gate.decide("/app", Err(&GateError::StoreUnavailable("down".into()))),
            login_redirect()
        );
        assert_eq!(gate.decide("/app", Err(&GateError::NoCredential)), login_redirect());
        assert_eq!(gate.decide("/", Err(&GateError::NoCredential)), Decision::Continue);
    }

    #[tokio::test]
    async fn revoked_sessions_fail_revalidation() {
        let store = Arc::new(MemoryStore::new());
        let entitled = claims(true, SubscriptionStatus::Active);
        let mut session =
            SessionRecord::new(entitled.clone(), OffsetDateTime::now_utc(), time::Duration::hours(1))
                .unwrap();
        store.create(&mut session).await.unwrap();

        let gate = gate().with_revalidation(store.clone(), Duration::from_millis(200));
        let token = credential(&entitled, &session.token);
        assert_eq!(gate.evaluate("/app", Some(&token)).await, Decision::Continue);

        store
            .revoke(&session.token, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert_eq!(gate.evaluate("/app", Some(&token)).await, login_redirect());

        let unknown = credential(&entitled, "never-issued");
        assert_eq!(gate.evaluate("/app", Some(&unknown)).await, login_redirect());
    }

    struct SlowStore;

    #[async_trait]
    impl SessionStore for SlowStore {
        async fn create(&self, _: &mut SessionRecord) -> Result<(), StoreError> {
            Ok(())
        }
        async fn save(&self, _: &SessionRecord) -> Result<(), StoreError> {
            Ok(())
        }
        async fn renew(&self, _: &SessionRecord) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn load(&self, _: &str) -> Result<Option<SessionRecord>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
        async fn revoke(&self, _: &str, _: OffsetDateTime) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_expired(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn create(&self, _: &mut SessionRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn save(&self, _: &SessionRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn renew(&self, _: &SessionRecord) -> Result<bool, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn load(&self, _: &str) -> Result<Option<SessionRecord>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn revoke(&self, _: &str, _: OffsetDateTime) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn delete_expired(&self) -> Result<u64, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn unreachable_store_fails_closed() {
        let entitled = claims(true, SubscriptionStatus::Active);
        let token = credential(&entitled, "s1");

        let slow = gate().with_revalidation(Arc::new(SlowStore), Duration::from_millis(20));
        let outcome = slow.authorize("/app", Some(&token)).await;
        assert_eq!(outcome.decision, login_redirect());
        assert!(outcome.denial.as_ref().is_some_and(GateError::is_retryable));

        let broken = gate().with_revalidation(Arc::new(BrokenStore), Duration::from_millis(200));
        let outcome = broken.authorize("/app", Some(&token)).await;
        assert_eq!(outcome.decision, login_redirect());
        assert!(matches!(outcome.denial, Some(GateError::StoreUnavailable(_))));

        // Public paths never touch the store
        assert_eq!(broken.evaluate("/", Some(&token)).await, Decision::Continue);
    }

    #[tokio::test]
    async fn sessions_owned_by_someone_else_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_user(UserRecord {
                id: "u2".into(),
                email: "other@jobai.dev".into(),
                role: Role::User,
                is_email_verified: true,
                subscription_status: SubscriptionStatus::Active,
            })
            .await;
        let mut other = claims(true, SubscriptionStatus::Active);
        other.user_id = "u2".into();
        let mut session =
            SessionRecord::new(other, OffsetDateTime::now_utc(), time::Duration::hours(1)).unwrap();
        store.create(&mut session).await.unwrap();

        let gate = gate().with_revalidation(store, Duration::from_millis(200));
        let forged = credential(&claims(true, SubscriptionStatus::Active), &session.token);
        assert_eq!(gate.evaluate("/app", Some(&forged)).await, login_redirect());
    }
}
