pub mod csrf;
pub mod identity;
pub mod principal;

pub use identity::{CacheIdentityStore, IdentityError, IdentityStore, SessionRecord, TokenRecord};
pub use principal::{Principal, Role};
