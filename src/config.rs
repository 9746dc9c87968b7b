//! Gate configuration, loaded from the environment.
//!
//! | Variable                    | Default         |
//! |-----------------------------|-----------------|
//! | `DATABASE_URL`              | unset           |
//! | `JOBAI_TOKEN_SECRET`        | required        |
//! | `JOBAI_SESSION_TTL_SECS`    | 7 days          |
//! | `JOBAI_COOKIE_NAME`         | `jobai_session` |
//! | `JOBAI_SECURE_COOKIES`      | `true`          |
//! | `JOBAI_REVALIDATE_SESSIONS` | `true`          |
//! | `JOBAI_STORE_TIMEOUT_MS`    | `500`           |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::access::Redirects;
use crate::error::ConfigError;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted session lifetime.
pub const MAX_SESSION_TTL: time::Duration = time::Duration::days(365);

/// Settings shared by the gate, the issuer and the session cookie.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Connection string for [`crate::Connector::options`].
    pub database_url: Option<String>,
    /// HS256 secret, at least [`MIN_SECRET_LEN`] bytes when read from the environment.
    pub token_secret: String,
    /// Lifetime of a session and of each credential issued for it.
    pub session_ttl: time::Duration,
    pub cookie_name: String,
    /// Send the session cookie with `Secure`. Only disable for local HTTP.
    pub secure_cookies: bool,
    /// Check every credential against the session store for revocation.
    pub revalidate_sessions: bool,
    /// Upper bound on a revalidation lookup before the gate fails closed.
    pub store_timeout: Duration,
    pub redirects: Redirects,
}

impl GateConfig {
    /// Defaults around the given signing secret.
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            token_secret: token_secret.into(),
            session_ttl: time::Duration::days(7),
            cookie_name: "jobai_session".to_string(),
            secure_cookies: true,
            revalidate_sessions: true,
            store_timeout: Duration::from_millis(500),
            redirects: Redirects::default(),
        }
    }

    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = lookup("JOBAI_TOKEN_SECRET").ok_or(ConfigError::Missing("JOBAI_TOKEN_SECRET"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "JOBAI_TOKEN_SECRET",
                value: format!("{} bytes, need at least {MIN_SECRET_LEN}", secret.len()),
            });
        }

        let mut config = Self::new(secret);
        config.database_url = lookup("DATABASE_URL");

        if let Some(secs) = parse::<i64>(&lookup, "JOBAI_SESSION_TTL_SECS")? {
            if secs <= 0 || secs > MAX_SESSION_TTL.whole_seconds() {
                return Err(ConfigError::Invalid {
                    key: "JOBAI_SESSION_TTL_SECS",
                    value: secs.to_string(),
                });
            }
            config.session_ttl = time::Duration::seconds(secs);
        }
        if let Some(name) = lookup("JOBAI_COOKIE_NAME").filter(|n| !n.is_empty()) {
            config.cookie_name = name;
        }
        if let Some(secure) = parse::<bool>(&lookup, "JOBAI_SECURE_COOKIES")? {
            config.secure_cookies = secure;
        }
        if let Some(revalidate) = parse::<bool>(&lookup, "JOBAI_REVALIDATE_SESSIONS")? {
            config.revalidate_sessions = revalidate;
        }
        if let Some(ms) = parse::<u64>(&lookup, "JOBAI_STORE_TIMEOUT_MS")? {
            config.store_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
