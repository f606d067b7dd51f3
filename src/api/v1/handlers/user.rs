/*
 * Responsibility
 * - GET /user: the principal the credential bridge resolved for this request
 */
use axum::Json;

use crate::api::v1::{dto::user::UserResponse, extractors::AuthCtxExtractor};

pub async fn current_user(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<UserResponse> {
    Json(ctx.into())
}
