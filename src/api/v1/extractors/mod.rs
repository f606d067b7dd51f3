pub mod accepts_json;
pub mod auth_ctx;

pub use accepts_json::AcceptsJson;
pub use auth_ctx::{AuthCtx, AuthCtxExtractor, AuthMethod};
