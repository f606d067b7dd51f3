use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::v1::extractors::AcceptsJson;
use crate::error::AppError;
use crate::state::AppState;

use super::AuthCtx;

/// Extractor for protected handlers.
/// Relies on the credential middleware having inserted `AuthCtx` into extensions.
/// Missing: 401 JSON for API callers, redirect to the login page otherwise.
pub struct AuthCtxExtractor(pub AuthCtx);

impl FromRequestParts<AppState> for AuthCtxExtractor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthCtx>() {
            return Ok(AuthCtxExtractor(ctx.clone()));
        }

        if AcceptsJson::from_headers(&parts.headers).0 {
            Err(AppError::Unauthenticated)
        } else {
            Err(AppError::LoginRedirect {
                location: state.config.login_url.clone(),
            })
        }
    }
}
