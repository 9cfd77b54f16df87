pub mod config;
pub mod env_guard;
pub mod error;
