//! Configuration module
//!
//! TOML settings for display, behavior and logging.

pub mod config;

pub use config::Config;
