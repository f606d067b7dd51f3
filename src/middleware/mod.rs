/*
 * Responsibility
 * - middleware の公開インターフェース
 * - cors::apply, auth::credential::apply, http::apply
 */
pub mod auth;
pub mod cors;
pub mod http;
