/*
 * Responsibility
 * - Expose gate decisions to the frontend (menu/button visibility)
 * - A denied single check is a plain 403, no reason given
 */
use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    api::v1::{
        dto::abilities::{AbilitiesResponse, AbilityQuery, AbilityResponse},
        extractors::AuthCtxExtractor,
    },
    error::AppError,
    state::AppState,
};

pub async fn list_abilities(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Json<AbilitiesResponse> {
    Json(AbilitiesResponse {
        abilities: state.gate.abilities(&ctx.principal),
    })
}

pub async fn check_ability(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(action): Path<String>,
    Query(query): Query<AbilityQuery>,
) -> Result<Json<AbilityResponse>, AppError> {
    let resource = query.resource()?;

    if !state
        .gate
        .check(&action, Some(&ctx.principal), resource.as_ref())
    {
        return Err(AppError::Forbidden);
    }

    Ok(Json(AbilityResponse {
        action,
        allowed: true,
    }))
}
