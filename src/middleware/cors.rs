//! CORS negotiation for the browser frontend.
//!
//! Note:
//! - CORS is enforced by browsers. Server-to-server calls are not restricted by it.
//! - Applied at the Router level so it sees every request before any handler.
//!
//! Policy:
//! - `OPTIONS` is answered here with `200` and an empty body; it never reaches a handler
//!   or the upstream.
//! - Headers are added only when the `Origin` is admitted by the allowlist. The literal
//!   origin is always echoed (never `*`) because credentials are allowed.
//! - Denied or absent origin: the response carries no CORS headers and the browser blocks
//!   the caller.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::services::origin::OriginAllowlist;

pub const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str =
    "Content-Type, Authorization, X-Requested-With, X-XSRF-TOKEN, X-CSRF-TOKEN, Accept";
pub const MAX_AGE_SECONDS: &str = "86400";

/// Apply the CORS responder to the given Router.
pub fn apply<S>(router: Router<S>, origins: Arc<OriginAllowlist>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(origins, cors_middleware))
}

async fn cors_middleware(
    State(origins): State<Arc<OriginAllowlist>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();
    let admitted = origin.as_ref().filter(|o| origins.admits(o)).cloned();

    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        if let Some(origin) = &admitted {
            grant(response.headers_mut(), origin);
            preflight(response.headers_mut());
        } else if origin.is_some() {
            tracing::debug!(origin = ?origin, "preflight from origin outside allowlist");
        }
        if origin.is_some() {
            vary_on_origin(response.headers_mut());
        }
        return response;
    }

    let mut response = next.run(req).await;

    if let Some(origin) = &admitted {
        grant(response.headers_mut(), origin);
    }
    if origin.is_some() {
        vary_on_origin(response.headers_mut());
    }

    response
}

fn grant(headers: &mut HeaderMap, origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

fn preflight(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECONDS),
    );
}

fn vary_on_origin(headers: &mut HeaderMap) {
    let already = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| v.trim().eq_ignore_ascii_case("origin") || v.trim() == "*");

    if !already {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}
