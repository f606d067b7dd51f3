pub mod cookies;
pub mod credential;

pub use credential::CurrentSession;
