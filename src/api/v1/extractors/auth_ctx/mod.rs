/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Hand the authenticated request context (AuthCtx) to handlers
 * - Keep axum plumbing in core, the contract types in types
 *
 * Public API:
 * - AuthCtx / AuthMethod
 * - AuthCtxExtractor
 */

mod core;
mod types;

pub use core::AuthCtxExtractor;
pub use types::{AuthCtx, AuthMethod};
