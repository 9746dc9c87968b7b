//! Signed bearer credentials.
//!
//! A credential is an HS256 JWT carrying the session id and the claims
//! snapshot. The gate trusts the embedded claims once the signature and
//! expiry check out; revocation is checked against the session store
//! separately.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::trace;

use crate::claims::Claims;
use crate::error::{GateError, IssueError};

/// Issuer name written into and required from every credential.
pub const TOKEN_ISSUER: &str = "jobai";

/// The JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    /// Session id the credential is bound to.
    pub sid: String,
    /// Always [`TOKEN_ISSUER`].
    pub iss: String,
    /// Issue time, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds. Matches the session's `expires_at` at signing time.
    pub exp: i64,
    #[serde(flatten)]
    pub claims: Claims,
}

/// A credential whose signature and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    /// The `sid` to look up in the session store.
    pub session_id: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub claims: Claims,
}

/// Signs and verifies credentials with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// HS256 signer for `secret`. Verification requires `exp` and `iss` and
    /// allows no clock leeway.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Signs `claims` for session `session_id`, valid until `expires_at`.
    pub fn sign(
        &self,
        session_id: &str,
        claims: &Claims,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<String, IssueError> {
        let payload = CredentialPayload {
            sid: session_id.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            claims: claims.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| IssueError::Signing(e.to_string()))
    }

    /// Checks signature, issuer and expiry.
    ///
    /// Every failure is reported as [`GateError::ExpiredOrInvalidCredential`]
    /// so callers treat it exactly like a missing credential.
    pub fn verify(&self, token: &str) -> Result<VerifiedCredential, GateError> {
        trace!("verifying credential");

        let data = decode::<CredentialPayload>(token, &self.decoding, &self.validation).map_err(
            |err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "credential has expired".to_string(),
                    ErrorKind::InvalidSignature => "invalid credential signature".to_string(),
                    ErrorKind::InvalidIssuer => "invalid credential issuer".to_string(),
                    ErrorKind::InvalidToken => "malformed credential".to_string(),
                    other => format!("credential rejected: {other:?}"),
                };
                GateError::ExpiredOrInvalidCredential(reason)
            },
        )?;

        let payload = data.claims;
        Ok(VerifiedCredential {
            session_id: payload.sid,
            expires_at: payload.exp,
            claims: payload.claims,
        })
    }
}
