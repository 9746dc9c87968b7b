//! Validation for records before they are persisted or turned into claims.

use crate::error::ValidationError;
use crate::store::{SessionRecord, UserRecord};

/// Checks a user record before claims are derived from it.
pub fn validate_user(user: &UserRecord) -> Result<(), ValidationError> {
    if user.id.trim().is_empty() {
        return Err(ValidationError::Empty("user id"));
    }
    validate_email(&user.email)
}

/// Checks a session before it is written to the store.
pub fn validate_session(session: &SessionRecord) -> Result<(), ValidationError> {
    if session.token.is_empty() {
        return Err(ValidationError::Empty("session token"));
    }
    if session.user_id.trim().is_empty() {
        return Err(ValidationError::Empty("session owner"));
    }
    if session.expires_at <= session.created_at {
        return Err(ValidationError::ExpiryBeforeCreation);
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let malformed = || ValidationError::Email(email.to_string());

    let (local, domain) = email.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Claims, Role, SubscriptionStatus};
    use time::{Duration, OffsetDateTime};

    fn user(email: &str) -> UserRecord {
        UserRecord {
            id: "u1".into(),
            email: email.into(),
            role: Role::User,
            is_email_verified: true,
            subscription_status: SubscriptionStatus::Active,
        }
    }

    #[test]
    fn emails() {
        assert!(validate_email("jane@jobai.dev").is_ok());
        for bad in ["", "jane", "@jobai.dev", "jane@", "jane@jobai", "a@b@c.d", "ja ne@x.io"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn users_need_an_id() {
        assert!(validate_user(&user("jane@jobai.dev")).is_ok());
        let mut nameless = user("jane@jobai.dev");
        nameless.id = " ".into();
        assert_eq!(
            validate_user(&nameless),
            Err(ValidationError::Empty("user id"))
        );
    }

    #[test]
    fn sessions_must_expire_after_creation() {
        let claims = Claims {
            user_id: "u1".into(),
            role: Role::User,
            is_email_verified: true,
            subscription_status: SubscriptionStatus::Active,
        };
        let now = OffsetDateTime::now_utc();
        let mut session = SessionRecord::new(claims, now, Duration::hours(1)).unwrap();
        assert!(validate_session(&session).is_ok());

        session.expires_at = now;
        assert_eq!(
            validate_session(&session),
            Err(ValidationError::ExpiryBeforeCreation)
        );
    }
}
