//! HTTP-level middleware (cross-cutting concerns).
//!
//! Two groups, split around the CORS layer:
//! - `apply_limits` sits inside CORS so a 408 or 413 still carries the
//!   `Access-Control-*` headers the frontend needs to read it.
//! - `apply` wraps everything (preflights included) with a request id and an
//!   access log line.
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Access logging / request tracing (TraceLayer)
//! - Body size limit (REQUEST_BODY_LIMIT_BYTES), replacing axum's 2 MB extractor default
//! - Global timeout, kept above the upstream timeout so a slow upstream surfaces
//!   as the proxy's own 500 rather than a bare 408

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::http::{StatusCode, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Body limit and global timeout.
pub fn apply_limits(router: Router, config: &Config) -> Router {
    let layers = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                tracing::error!(error = %err, "unhandled middleware error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        .layer(RequestBodyLimitLayer::new(config.request_body_limit_bytes))
        .layer(DefaultBodyLimit::disable())
        .layer(TimeoutLayer::new(config.upstream_timeout + TIMEOUT_GRACE));

    router.layer(layers)
}

/// Request id and access log, outermost.
pub fn apply(router: Router) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(TraceLayer::new_for_http());

    router.layer(layers)
}
