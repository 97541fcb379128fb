pub mod column_manager;
pub mod config;
pub mod data;
pub mod search;
pub mod session;
pub mod utils;
pub mod views;

pub use session::{ExplorerSession, SessionOptions};
