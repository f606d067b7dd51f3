pub mod abilities;
pub mod user;
