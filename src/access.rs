//! Path classification: which access level a URL path requires.

use serde::{Deserialize, Serialize};

/// Access required to reach a path. Levels are ordered; each one includes the
/// checks of the levels below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No credential required.
    Public,
    /// A valid session, email verification not required.
    Authenticated,
    /// A valid session with a verified email address.
    Verified,
    /// A verified session with an active subscription.
    Subscribed,
}

/// Static mapping from path prefix to [`AccessLevel`].
///
/// Matching is segment-aware longest-prefix: `/app` covers `/app` and
/// `/app/profile` but not `/apple`. Paths matching no rule are
/// [`AccessLevel::Public`], so the classification is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    rules: Vec<(String, AccessLevel)>,
}

impl PathTable {
    /// An empty table. Every path is public until rules are added.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule, replacing any existing rule for the same prefix.
    pub fn with_rule(mut self, prefix: impl Into<String>, level: AccessLevel) -> Self {
        let prefix = normalize_prefix(prefix.into());
        self.rules.retain(|(existing, _)| *existing != prefix);
        self.rules.push((prefix, level));
        // Longest prefix first so the first match is the most specific one.
        self.rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// The canonical JobAI table.
    ///
    /// Credential-issuance endpoints are listed explicitly as public so they
    /// stay reachable even when nested under a protected prefix.
    pub fn jobai() -> Self {
        Self::new()
            .with_rule("/api/auth", AccessLevel::Public)
            .with_rule("/auth", AccessLevel::Public)
            .with_rule("/login", AccessLevel::Public)
            .with_rule("/register", AccessLevel::Public)
            .with_rule("/verify-email", AccessLevel::Authenticated)
            .with_rule("/subscription", AccessLevel::Verified)
            .with_rule("/dashboard", AccessLevel::Verified)
            .with_rule("/profile", AccessLevel::Verified)
            .with_rule("/applications", AccessLevel::Verified)
            .with_rule("/api/applications", AccessLevel::Verified)
            .with_rule("/api/resumes", AccessLevel::Verified)
            .with_rule("/api/cover-letters", AccessLevel::Verified)
            .with_rule("/app", AccessLevel::Subscribed)
            .with_rule("/premium", AccessLevel::Subscribed)
    }

    /// Returns the level required by `path`.
    pub fn classify(&self, path: &str) -> AccessLevel {
        self.rules
            .iter()
            .find(|(prefix, _)| path_has_prefix(path, prefix))
            .map(|(_, level)| *level)
            .unwrap_or(AccessLevel::Public)
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self::jobai()
    }
}

/// Well-known pages the gate and the guard redirect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirects {
    /// Sign-in page, target of every unauthenticated redirect.
    pub login: String,
    /// Where signed-in users with an unverified email address are sent.
    pub verify_email: String,
    /// Plan selection page for users without an active subscription.
    pub subscription: String,
    /// Query parameter carrying the original path on login redirects.
    pub return_param: String,
}

impl Redirects {
    /// Builds the login URL that resumes at `original_path` afterwards.
    pub fn login_with_return(&self, original_path: &str) -> String {
        self.with_return(&self.login, original_path)
    }

    /// `target` with `original_path` percent-encoded under [`Self::return_param`].
    pub fn with_return(&self, target: &str, original_path: &str) -> String {
        format!(
            "{}?{}={}",
            target,
            self.return_param,
            urlencoding::encode(original_path)
        )
    }
}

impl Default for Redirects {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            verify_email: "/verify-email".to_string(),
            subscription: "/subscription".to_string(),
            return_param: "redirect".to_string(),
        }
    }
}

/// Whether `path` equals `prefix` or continues it with a new segment.
pub(crate) fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
