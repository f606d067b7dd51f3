pub mod auth;
pub mod cache;
pub mod gate;
pub mod origin;
pub mod upstream;
