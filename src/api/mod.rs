pub mod proxy;
pub mod v1;
