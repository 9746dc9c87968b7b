//! axum middleware applying the [`AccessGate`] to every request.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tower_sessions::cookie::Cookie;

use crate::gate::AccessGate;

/// State for [`require_access`].
#[derive(Clone)]
pub struct GateState {
    pub gate: Arc<AccessGate>,
    /// Cookie the credential is read from before the `Authorization` header.
    pub cookie_name: String,
}

impl GateState {
    pub fn new(gate: Arc<AccessGate>, cookie_name: impl Into<String>) -> Self {
        Self {
            gate,
            cookie_name: cookie_name.into(),
        }
    }
}

/// Runs the gate. Redirects answer with `307 Temporary Redirect`; requests
/// that continue carry the caller's [`crate::Claims`] as an extension.
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Router};
/// use jobai_access_gate::{require_access, AccessGate, GateState, PathTable, Redirects, TokenSigner};
///
/// let gate = AccessGate::new(
///     TokenSigner::new(b"a secret of at least thirty-two bytes"),
///     PathTable::jobai(),
///     Redirects::default(),
/// );
/// let app: Router = Router::new()
///     .route("/app/profile", get(|| async { "profile" }))
///     .layer(middleware::from_fn_with_state(
///         GateState::new(Arc::new(gate), "jobai_session"),
///         require_access,
///     ));
/// ```
pub async fn require_access(
    State(state): State<GateState>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let credential = credential_from_headers(req.headers(), &state.cookie_name);

    let outcome = state.gate.authorize(&path, credential.as_deref()).await;
    match outcome.decision.location(&path, state.gate.redirects()) {
        None => {
            if let Some(claims) = outcome.claims {
                req.extensions_mut().insert(claims);
            }
            next.run(req).await
        }
        Some(location) => Redirect::temporary(&location).into_response(),
    }
}

/// The credential from the session cookie, falling back to a bearer header.
pub fn credential_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}
