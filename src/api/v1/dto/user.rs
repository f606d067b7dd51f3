/*
 * Responsibility
 * - Response DTO for the current principal (GET /api/v1/user)
 */
use serde::Serialize;
use uuid::Uuid;

use crate::api::v1::extractors::{AuthCtx, AuthMethod};
use crate::services::auth::Role;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// "session" or "token"
    pub authenticated_by: &'static str,
}

impl From<AuthCtx> for UserResponse {
    fn from(ctx: AuthCtx) -> Self {
        Self {
            id: ctx.principal.id,
            role: ctx.principal.role,
            name: ctx.principal.name,
            authenticated_by: match ctx.method {
                AuthMethod::Session { .. } => "session",
                AuthMethod::Bearer => "token",
            },
        }
    }
}
