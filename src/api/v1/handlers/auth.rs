/*
 * Responsibility
 * - GET  /auth/csrf-cookie: make sure a session exists, hand its CSRF token to the browser
 * - POST /auth/logout: drop the session and clear both cookies
 */
use std::time::Duration;

use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    api::v1::extractors::{AuthCtxExtractor, AuthMethod},
    error::AppError,
    middleware::auth::{
        CurrentSession,
        cookies::{CookieAttrs, XSRF_COOKIE_NAME, set_cookie},
    },
    services::auth::{SessionRecord, csrf},
    state::AppState,
};

pub async fn csrf_cookie(
    State(state): State<AppState>,
    session: Option<Extension<CurrentSession>>,
) -> Result<Response, AppError> {
    let (session_id, mut record, is_new) = match session {
        Some(Extension(current)) => (current.id, current.record, false),
        None => (csrf::generate_token()?, SessionRecord::anonymous(), true),
    };

    // Keep an existing token so other open tabs stay valid.
    let token = match record.csrf_token.clone() {
        Some(token) => token,
        None => csrf::generate_token()?,
    };
    record.csrf_token = Some(token.clone());

    let config = &state.config;
    state
        .identity
        .put_session(
            &session_id,
            &record,
            Duration::from_secs(config.session_ttl_seconds),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to store session");
            AppError::Internal
        })?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    if is_new {
        headers.append(
            header::SET_COOKIE,
            set_cookie(
                &config.session_cookie_name,
                &session_id,
                CookieAttrs::from_config(config, true),
            )?,
        );
    }
    headers.append(
        header::SET_COOKIE,
        set_cookie(XSRF_COOKIE_NAME, &token, CookieAttrs::from_config(config, false))?,
    );

    Ok(response)
}

pub async fn logout(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Response, AppError> {
    let mut response = StatusCode::NO_CONTENT.into_response();

    // Bearer tokens are revoked by the upstream application, not here.
    if let AuthMethod::Session { session_id } = &ctx.method {
        state.identity.delete_session(session_id).await.map_err(|e| {
            tracing::error!(error = %e, "failed to delete session");
            AppError::Internal
        })?;

        let config = &state.config;
        let headers = response.headers_mut();
        headers.append(
            header::SET_COOKIE,
            set_cookie(
                &config.session_cookie_name,
                "",
                CookieAttrs::from_config(config, true).expired(),
            )?,
        );
        headers.append(
            header::SET_COOKIE,
            set_cookie(
                XSRF_COOKIE_NAME,
                "",
                CookieAttrs::from_config(config, false).expired(),
            )?,
        );
    }

    tracing::info!(principal_id = %ctx.principal.id, "logout");
    Ok(response)
}
