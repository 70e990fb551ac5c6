pub mod config;
pub mod validate;
