/*
 * Responsibility
 * - URL layout of v1
 * - The credential bridge wraps the whole v1 router (see app.rs); protection is
 *   per-handler through AuthCtxExtractor
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use crate::api::v1::handlers::{
    abilities::{check_ability, list_abilities},
    auth::{csrf_cookie, logout},
    user::current_user,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/csrf-cookie", get(csrf_cookie))
        .route("/auth/logout", post(logout))
        .route("/user", get(current_user))
        .route("/abilities", get(list_abilities))
        .route("/abilities/{action}", get(check_ability))
}
