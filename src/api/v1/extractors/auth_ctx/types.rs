/*
 * Responsibility
 * - The "authenticated context" type handlers see
 * - The credential middleware validates and stores it in request extensions;
 *   handlers only receive this type
 */

use crate::services::auth::Principal;

/// How the principal was established for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Session { session_id: String },
    Bearer,
}

#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub principal: Principal,
    pub method: AuthMethod,
}
