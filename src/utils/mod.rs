//! Utility functions and helpers
//!
//! Application paths, id generation and the logging setup.

pub mod app_paths;
pub mod id_gen;
pub mod logging;
