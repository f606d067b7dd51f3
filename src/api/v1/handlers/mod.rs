pub mod abilities;
pub mod auth;
pub mod health;
pub mod user;
