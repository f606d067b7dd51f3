/*
 * Responsibility
 * - ANY /api/proxy/{*path} → upstream base + path + query
 * - ANY /api/proxy (with or without trailing slash) → upstream base itself
 * - OPTIONS never gets here (answered by the CORS layer)
 * - Transport failures become 500 {"error": ...}; upstream statuses pass through untouched
 */
use axum::{
    Router,
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method},
    response::Response,
    routing::any,
};

use crate::{error::AppError, state::AppState};

pub const PREFIX: &str = "/api/proxy";

/// Full paths, merged into the root router (a nest would miss the bare prefix).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(PREFIX, any(forward))
        .route("/api/proxy/", any(forward))
        .route("/api/proxy/{*path}", any(forward))
}

async fn forward(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let rest = uri.path().strip_prefix(PREFIX).unwrap_or(uri.path());
    let target = state.forwarder.target(rest, uri.query())?;

    match state
        .forwarder
        .forward(&target, method.clone(), &headers, body)
        .await
    {
        Ok(response) => {
            tracing::debug!(
                %method,
                target = %target.url(),
                status = response.status().as_u16(),
                "proxied"
            );
            Ok(response)
        }
        Err(err) => {
            tracing::error!(
                %method,
                target = %target.url(),
                error = %err,
                "upstream request failed"
            );
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::middleware;
    use axum::{
        Json,
        body::Body,
        http::{Request, StatusCode, header},
        response::IntoResponse,
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    const FRONTEND: &str = "https://admin.fleet.test";

    /// Fake upstream: echoes what it received as JSON, plus a few fixed routes.
    async fn spawn_upstream() -> String {
        async fn echo(
            method: Method,
            OriginalUri(uri): OriginalUri,
            headers: HeaderMap,
            body: Bytes,
        ) -> impl IntoResponse {
            let header = |name: header::HeaderName| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            Json(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "content_type": header(header::CONTENT_TYPE),
                "authorization": header(header::AUTHORIZATION),
                "accept": header(header::ACCEPT),
                "x_requested_with": headers.get("x-requested-with").and_then(|v| v.to_str().ok()),
                "cookie": header(header::COOKIE),
                "body": String::from_utf8_lossy(&body),
            }))
        }

        let app = axum::Router::new()
            .route(
                "/api/missing",
                axum::routing::get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
                        Json(json!({"message": "not found"})),
                    )
                }),
            )
            .route(
                "/api/moved",
                axum::routing::get(|| async {
                    (StatusCode::FOUND, [(header::LOCATION, "https://elsewhere.test/login")])
                }),
            )
            .route(
                "/api/invalid",
                axum::routing::post(|| async {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(json!({"message": "invalid", "errors": {"plate": ["required"]}})),
                    )
                }),
            )
            .fallback(echo)
            .layer(axum::extract::DefaultBodyLimit::disable());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}/api")
    }

    fn gateway(upstream: &str) -> Router {
        let config = Config::for_tests(upstream, &[FRONTEND]);
        let (state, _) = AppState::for_tests(config);
        let origins = state.origins.clone();
        let router = routes().with_state(state);
        middleware::cors::apply(router, Arc::clone(&origins))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[tokio::test]
    async fn get_forwards_path_and_query_without_body() {
        let upstream = spawn_upstream().await;
        let (status, _, body) = send(
            gateway(&upstream),
            Request::builder()
                .uri("/api/proxy/x/y?z=1")
                .header(header::COOKIE, "fleet_session=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let seen: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(seen["method"], "GET");
        assert_eq!(seen["path"], "/api/x/y");
        assert_eq!(seen["query"], "z=1");
        assert_eq!(seen["body"], "");
        assert_eq!(seen["content_type"], Value::Null);
        assert_eq!(seen["cookie"], Value::Null);
        assert_eq!(seen["accept"], "application/json");
        assert_eq!(seen["x_requested_with"], "XMLHttpRequest");
    }

    #[tokio::test]
    async fn post_forwards_body_bytes_and_headers() {
        let upstream = spawn_upstream().await;
        let (_, _, body) = send(
            gateway(&upstream),
            Request::builder()
                .method(Method::POST)
                .uri("/api/proxy/vehicles")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer 7|secret")
                .body(Body::from(r#"{"a":1}"#))
                .unwrap(),
        )
        .await;

        let seen: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(seen["method"], "POST");
        assert_eq!(seen["body"], r#"{"a":1}"#);
        assert_eq!(seen["content_type"], "application/json");
        assert_eq!(seen["authorization"], "Bearer 7|secret");
    }

    #[tokio::test]
    async fn post_without_content_type_gets_json_injected() {
        let upstream = spawn_upstream().await;
        let (_, _, body) = send(
            gateway(&upstream),
            Request::builder()
                .method(Method::POST)
                .uri("/api/proxy/activities")
                .body(Body::from(r#"{"a":1}"#))
                .unwrap(),
        )
        .await;

        let seen: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(seen["content_type"], "application/json");
        assert_eq!(seen["body"], r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn upstream_errors_pass_through_with_cors_overlay() {
        let upstream = spawn_upstream().await;
        let (status, headers, body) = send(
            gateway(&upstream),
            Request::builder()
                .uri("/api/proxy/missing")
                .header(header::ORIGIN, FRONTEND)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(&body[..], br#"{"message":"not found"}"#);
        // upstream's wildcard is replaced by the literal origin
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), FRONTEND);
        assert_eq!(headers.get("access-control-allow-credentials").unwrap(), "true");
    }

    #[tokio::test]
    async fn upstream_cors_headers_never_reach_denied_origins() {
        let upstream = spawn_upstream().await;
        let (_, headers, _) = send(
            gateway(&upstream),
            Request::builder()
                .uri("/api/proxy/missing")
                .header(header::ORIGIN, "https://evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert!(headers.get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn validation_errors_are_not_translated() {
        let upstream = spawn_upstream().await;
        let (status, _, body) = send(
            gateway(&upstream),
            Request::builder()
                .method(Method::POST)
                .uri("/api/proxy/invalid")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["errors"]["plate"][0], "required");
    }

    #[tokio::test]
    async fn redirects_are_relayed_not_followed() {
        let upstream = spawn_upstream().await;
        let (status, headers, _) = send(
            gateway(&upstream),
            Request::builder()
                .uri("/api/proxy/moved")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "https://elsewhere.test/login"
        );
    }

    #[tokio::test]
    async fn options_is_answered_without_contacting_upstream() {
        // nothing listens on the upstream; a forwarded request would fail with 500
        let (status, headers, body) = send(
            gateway("http://127.0.0.1:9"),
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/proxy/vehicles")
                .header(header::ORIGIN, FRONTEND)
                .header("access-control-request-method", "DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), FRONTEND);
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_500_with_error_message() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (status, headers, body) = send(
            gateway(&format!("http://{addr}")),
            Request::builder()
                .uri("/api/proxy/vehicles")
                .header(header::ORIGIN, FRONTEND)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["error"].as_str().is_some_and(|m| !m.is_empty()));
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), FRONTEND);
    }

    #[tokio::test]
    async fn dot_segments_are_rejected_before_forwarding() {
        let (status, _, _) = send(
            gateway("http://127.0.0.1:9/api"),
            Request::builder()
                .uri("/api/proxy/a/%2e%2e/admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn repeated_requests_are_transparent() {
        let upstream = spawn_upstream().await;
        let request = || {
            Request::builder()
                .method(Method::PUT)
                .uri("/api/proxy/drivers/4?include=licenses")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"Rossi"}"#))
                .unwrap()
        };

        let first = send(gateway(&upstream), request()).await;
        let second = send(gateway(&upstream), request()).await;

        assert_eq!(first.0, second.0);
        assert_eq!(first.2, second.2);
    }

    #[tokio::test]
    async fn bare_prefix_forwards_to_the_upstream_base() {
        let upstream = spawn_upstream().await;
        for uri in ["/api/proxy?page=2", "/api/proxy/?page=2"] {
            let (status, _, body) = send(
                gateway(&upstream),
                Request::builder().uri(uri).body(Body::empty()).unwrap(),
            )
            .await;

            assert_eq!(status, StatusCode::OK, "{uri}");
            let seen: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(seen["path"], "/api", "{uri}");
            assert_eq!(seen["query"], "page=2", "{uri}");
        }
    }

    #[tokio::test]
    async fn uploads_above_the_extractor_default_reach_upstream() {
        let upstream = spawn_upstream().await;
        let mut config = Config::for_tests(&upstream, &[FRONTEND]);
        config.request_body_limit_bytes = 10 * 1024 * 1024;
        let (state, _) = AppState::for_tests(config);
        let app = crate::app::build_router(state);

        let size = 3 * 1024 * 1024;
        let (status, _, body) = send(
            app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/proxy/documents")
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(Body::from(vec![b'x'; size]))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let seen: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(seen["path"], "/api/documents");
        assert_eq!(seen["body"].as_str().map(str::len), Some(size));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_with_cors_headers() {
        let mut config = Config::for_tests("http://127.0.0.1:9/api", &[FRONTEND]);
        config.request_body_limit_bytes = 16;
        let (state, _) = AppState::for_tests(config);
        let app = crate::app::build_router(state);

        let (status, headers, _) = send(
            app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/proxy/documents")
                .header(header::ORIGIN, FRONTEND)
                .header(header::CONTENT_LENGTH, "64")
                .body(Body::from(vec![b'x'; 64]))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), FRONTEND);
    }
}
