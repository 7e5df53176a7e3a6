pub mod config;
pub mod pending;
