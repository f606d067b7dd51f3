//! Credential bridge: session cookie (+ CSRF) or bearer token → `AuthCtx` in extensions.
//!
//! - A known session cookie loads the session record; if it carries a principal,
//!   the request is authenticated by session.
//! - Otherwise `Authorization: Bearer <token>` is resolved against the identity store.
//! - Neither: the request continues unauthenticated. Protected handlers reject it
//!   through `AuthCtxExtractor`.
//!
//! State-changing requests that carry the session cookie must echo the session's
//! CSRF token in `X-XSRF-TOKEN` or `X-CSRF-TOKEN`, unless the path starts with one
//! of the configured exempt prefixes. Mismatch → 419.

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::{AuthCtx, AuthMethod};
use crate::error::AppError;
use crate::middleware::auth::cookies::cookie_value;
use crate::services::auth::{SessionRecord, csrf};
use crate::state::AppState;

const CSRF_HEADERS: [&str; 2] = ["x-xsrf-token", "x-csrf-token"];

/// Session loaded for this request (present even when nobody is logged in yet).
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: String,
    pub record: SessionRecord,
}

/// Attach the credential bridge to the given router.
///
/// ```ignore
/// let v1 = api::v1::routes();
/// let v1 = middleware::auth::credential::apply(v1, state.clone());
/// app = app.nest("/api/v1", v1);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, credential_middleware))
}

async fn credential_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session_cookie = cookie_value(req.headers(), &state.config.session_cookie_name);

    let session = match &session_cookie {
        Some(id) => match state.identity.find_session(id).await {
            Ok(record) => record.map(|record| CurrentSession {
                id: id.clone(),
                record,
            }),
            Err(err) => {
                // fail closed: behave as if no session existed
                tracing::warn!(error = %err, "session lookup failed");
                None
            }
        },
        None => None,
    };

    if session_cookie.is_some()
        && is_state_changing(req.method())
        && !is_exempt(original_uri.path(), &state.config.csrf_exempt_prefixes)
    {
        let expected = session.as_ref().and_then(|s| s.record.csrf_token.as_deref());
        if !csrf_token_matches(expected, req.headers()) {
            tracing::warn!(
                method = %req.method(),
                path = %original_uri.path(),
                has_session = session.is_some(),
                "csrf token mismatch"
            );
            return Err(AppError::CsrfMismatch);
        }
    }

    let mut auth_ctx = session.as_ref().and_then(|s| {
        s.record.principal.clone().map(|principal| AuthCtx {
            principal,
            method: AuthMethod::Session {
                session_id: s.id.clone(),
            },
        })
    });

    if auth_ctx.is_none()
        && let Some(token) = bearer_token(req.headers())
    {
        match state.identity.find_token(token).await {
            Ok(Some(principal)) => {
                auth_ctx = Some(AuthCtx {
                    principal,
                    method: AuthMethod::Bearer,
                });
            }
            Ok(None) => tracing::warn!("bearer token rejected"),
            Err(err) => tracing::warn!(error = %err, "bearer token lookup failed"),
        }
    }

    if let Some(ctx) = auth_ctx {
        req.extensions_mut().insert(ctx);
    }
    if let Some(session) = session {
        req.extensions_mut().insert(session);
    }

    Ok(next.run(req).await)
}

fn is_state_changing(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

fn is_exempt(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn csrf_token_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return false;
    };

    CSRF_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .any(|presented| csrf::tokens_match(expected, presented))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn only_unsafe_methods_need_csrf() {
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::DELETE));
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
        assert!(!is_state_changing(&Method::OPTIONS));
    }

    #[test]
    fn exemption_is_by_prefix() {
        let prefixes = vec!["/api/proxy/".to_string(), "/api/v1/auth/".to_string()];
        assert!(is_exempt("/api/v1/auth/csrf-cookie", &prefixes));
        assert!(is_exempt("/api/proxy/vehicles", &prefixes));
        assert!(!is_exempt("/api/v1/user", &prefixes));
        assert!(!is_exempt("/api/v1/authx", &prefixes));
    }

    #[test]
    fn bearer_scheme_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer 1|abc"));
        assert_eq!(bearer_token(&headers), Some("1|abc"));
    }

    #[test]
    fn either_csrf_header_is_accepted() {
        let mut headers = HeaderMap::new();
        assert!(!csrf_token_matches(Some("tok"), &headers));

        headers.insert("x-csrf-token", HeaderValue::from_static("tok"));
        assert!(csrf_token_matches(Some("tok"), &headers));
        assert!(!csrf_token_matches(None, &headers));

        let mut headers = HeaderMap::new();
        headers.insert("x-xsrf-token", HeaderValue::from_static("other"));
        assert!(!csrf_token_matches(Some("tok"), &headers));
    }
}
